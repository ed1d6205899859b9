//! QuerySpec Validator / Intent Normalizer
//!
//! Turns the untrusted JSON emitted by the language model into a typed
//! [`ChartIntent`]. Every rejection names the offending field.
//!
//! Repairs applied on the way:
//! - operators are case-insensitive and `==` means `=`
//! - a scalar value on `IN` becomes a one-element list
//! - a `LIKE` value wrapped in `%...%` loses the wrapping; the rest
//!   matches as a plain substring
//! - blank `measure`/`dimension`/`seriesDimension` count as absent
//! - `seriesDimension` is dropped when `multiSeries` is false
//! - comparison questions get promoted to multi-series
//!   (see [`heuristics::multi_series_promotion`]); only `IN` filters that
//!   arrived as lists take part, not ones repaired from a scalar

use crate::error::{ChartError, EngineResult};
use crate::heuristics;
use crate::query::types::*;
use crate::value::Value;
use serde_json::{Map, Value as Json};

/// Validate a full intent (`{chartType, title?, dataQuery}`)
///
/// A bare query spec (an object with `type` and no `dataQuery`) is accepted
/// as a bar chart.
pub fn validate_intent(raw: &Json, question: Option<&str>) -> EngineResult<ChartIntent> {
    let obj = as_object(raw, "intent")?;

    let chart_type = match optional_string(obj, "chartType")? {
        None => ChartType::default(),
        Some(s) => ChartType::from_str(&s).ok_or_else(|| {
            ChartError::validation("chartType", format!("has unsupported value `{}`", s))
        })?,
    };
    let title = optional_string(obj, "title")?;

    let data_query = match obj.get("dataQuery") {
        Some(spec) => validate_query(spec, question)?,
        None if obj.contains_key("type") => validate_query(raw, question)?,
        None => return Err(ChartError::validation("dataQuery", "is required")),
    };

    Ok(ChartIntent {
        chart_type,
        title,
        data_query,
    })
}

/// Validate and repair a bare query spec
pub fn validate_query(raw: &Json, question: Option<&str>) -> EngineResult<DataQuerySpec> {
    let obj = as_object(raw, "dataQuery")?;

    let kind = optional_string(obj, "type")?
        .ok_or_else(|| ChartError::validation("type", "is required"))?;
    let aggregation = AggregationType::from_str(&kind).ok_or_else(|| {
        ChartError::validation("type", format!("has unsupported value `{}`", kind))
    })?;

    let multi_series = match obj.get("multiSeries") {
        None | Some(Json::Null) => false,
        Some(Json::Bool(b)) => *b,
        Some(Json::String(s)) if s.eq_ignore_ascii_case("true") => true,
        Some(Json::String(s)) if s.eq_ignore_ascii_case("false") => false,
        Some(_) => return Err(ChartError::validation("multiSeries", "must be a boolean")),
    };

    let parsed = match obj.get("filters") {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_filter(i, item))
            .collect::<EngineResult<Vec<_>>>()?,
        Some(_) => return Err(ChartError::validation("filters", "must be a list")),
    };

    let mut spec = DataQuerySpec {
        aggregation,
        measure: optional_string(obj, "measure")?,
        dimension: optional_string(obj, "dimension")?,
        multi_series,
        series_dimension: optional_string(obj, "seriesDimension")?,
        filters: parsed
            .iter()
            .filter(|p| p.as_sent)
            .map(|p| p.filter.clone())
            .collect(),
    };

    if let Some(column) = heuristics::multi_series_promotion(&spec, question) {
        tracing::debug!(series = %column, "Promoting comparison question to multi-series");
        spec.multi_series = true;
        spec.series_dimension = Some(column);
    }
    spec.filters = parsed.into_iter().map(|p| p.filter).collect();

    if !spec.multi_series {
        spec.series_dimension = None;
    }

    check_spec(&spec)?;
    Ok(spec)
}

/// Re-check the required fields of an already-typed query
pub fn check_spec(spec: &DataQuerySpec) -> EngineResult<()> {
    if spec.aggregation.requires_measure() && is_blank(&spec.measure) {
        return Err(ChartError::validation(
            "measure",
            format!("is required for {}", spec.aggregation),
        ));
    }
    if spec.multi_series && is_blank(&spec.series_dimension) {
        return Err(ChartError::validation(
            "seriesDimension",
            "is required when multiSeries is true",
        ));
    }
    if is_blank(&spec.dimension) && spec.dimension.is_some() {
        return Err(ChartError::validation("dimension", "must not be blank"));
    }

    for (i, filter) in spec.filters.iter().enumerate() {
        if filter.column.trim().is_empty() {
            return Err(ChartError::validation(
                format!("filters[{}].column", i),
                "is required",
            ));
        }
        match (&filter.operator, &filter.value) {
            (FilterOp::In, FilterValue::List(values)) if values.is_empty() => {
                return Err(ChartError::validation(
                    format!("filters[{}].value", i),
                    "must not be an empty list",
                ));
            }
            (FilterOp::In, _) => {}
            (op, FilterValue::List(_)) => {
                return Err(ChartError::validation(
                    format!("filters[{}].value", i),
                    format!("must be a single value for operator {}", op),
                ));
            }
            (_, FilterValue::Scalar(_)) => {}
        }
    }

    Ok(())
}

/// A parsed filter and whether its value kept the shape it was sent in
struct ParsedFilter {
    filter: Filter,
    as_sent: bool,
}

fn parse_filter(index: usize, raw: &Json) -> EngineResult<ParsedFilter> {
    let field = |name: &str| format!("filters[{}].{}", index, name);
    let obj = as_object(raw, &format!("filters[{}]", index))?;

    let column = obj
        .get("column")
        .and_then(Json::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ChartError::validation(field("column"), "is required"))?
        .to_string();

    let op_text = obj
        .get("operator")
        .and_then(Json::as_str)
        .ok_or_else(|| ChartError::validation(field("operator"), "is required"))?;
    let operator = FilterOp::from_str(op_text).ok_or_else(|| {
        ChartError::validation(field("operator"), format!("has unsupported value `{}`", op_text))
    })?;

    let raw_value = obj
        .get("value")
        .ok_or_else(|| ChartError::validation(field("value"), "is required"))?;
    let mut as_sent = true;
    let value = match raw_value {
        Json::Array(items) => {
            let values = items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ChartError::validation(field("value"), "must contain only scalars"))?;
            FilterValue::List(values)
        }
        scalar => {
            let value = Value::from_json(scalar)
                .ok_or_else(|| ChartError::validation(field("value"), "must be a scalar or a list"))?;
            match (operator, value) {
                (FilterOp::In, value) => {
                    as_sent = false;
                    FilterValue::List(vec![value])
                }
                (FilterOp::Like, Value::Text(text)) => FilterValue::Scalar(Value::Text(unwrap_like(text))),
                (_, value) => FilterValue::Scalar(value),
            }
        }
    };

    Ok(ParsedFilter {
        filter: Filter {
            column,
            operator,
            value,
        },
        as_sent,
    })
}

/// Drop one `%` from each end of a `%needle%` pattern
fn unwrap_like(text: String) -> String {
    match text.strip_prefix('%').and_then(|t| t.strip_suffix('%')) {
        Some(inner) if !inner.is_empty() => inner.to_string(),
        _ => text,
    }
}

fn as_object<'a>(raw: &'a Json, field: &str) -> EngineResult<&'a Map<String, Json>> {
    raw.as_object()
        .ok_or_else(|| ChartError::validation(field, "must be an object"))
}

/// Read an optional string field; blank strings count as absent
fn optional_string(obj: &Map<String, Json>, name: &str) -> EngineResult<Option<String>> {
    match obj.get(name) {
        None | Some(Json::Null) => Ok(None),
        Some(Json::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Json::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ChartError::validation(name, "must be a string")),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_of(err: ChartError) -> String {
        match err {
            ChartError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_spec() {
        let spec = validate_query(
            &json!({
                "type": "sum",
                "measure": "Sales",
                "dimension": "Region",
                "filters": [{"column": "Category", "operator": "=", "value": "Furniture"}]
            }),
            None,
        )
        .unwrap();

        assert_eq!(spec.aggregation, AggregationType::Sum);
        assert_eq!(spec.measure.as_deref(), Some("Sales"));
        assert_eq!(spec.filters[0], Filter::eq("Category", "Furniture"));
    }

    #[test]
    fn test_sum_without_measure_fails() {
        let err = validate_query(&json!({"type": "sum", "dimension": "Region"}), None).unwrap_err();
        assert_eq!(field_of(err), "measure");

        let err = validate_query(&json!({"type": "average", "measure": "  "}), None).unwrap_err();
        assert_eq!(field_of(err), "measure");
    }

    #[test]
    fn test_count_needs_no_measure() {
        let spec = validate_query(&json!({"type": "COUNT", "dimension": "Region"}), None).unwrap();
        assert_eq!(spec.aggregation, AggregationType::Count);
    }

    #[test]
    fn test_multi_series_requires_series_dimension() {
        let err = validate_query(
            &json!({"type": "count", "dimension": "Region", "multiSeries": true}),
            None,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "seriesDimension");
    }

    #[test]
    fn test_type_errors_name_the_field() {
        assert_eq!(field_of(validate_query(&json!({}), None).unwrap_err()), "type");
        assert_eq!(
            field_of(validate_query(&json!({"type": "median", "measure": "x"}), None).unwrap_err()),
            "type"
        );
        assert_eq!(
            field_of(validate_query(&json!({"type": "count", "multiSeries": 3}), None).unwrap_err()),
            "multiSeries"
        );
        assert_eq!(
            field_of(validate_query(&json!({"type": "count", "filters": {}}), None).unwrap_err()),
            "filters"
        );
    }

    #[test]
    fn test_filter_errors_name_the_index() {
        let err = validate_query(
            &json!({"type": "count", "filters": [
                {"column": "A", "operator": "=", "value": "x"},
                {"column": "B", "operator": "!=", "value": "y"}
            ]}),
            None,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "filters[1].operator");

        let err = validate_query(
            &json!({"type": "count", "filters": [{"operator": "=", "value": "x"}]}),
            None,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "filters[0].column");

        let err = validate_query(
            &json!({"type": "count", "filters": [{"column": "A", "operator": ">", "value": [1, 2]}]}),
            None,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "filters[0].value");
    }

    #[test]
    fn test_scalar_in_becomes_list() {
        let spec = validate_query(
            &json!({"type": "count", "filters": [{"column": "State", "operator": "in", "value": "Ohio"}]}),
            None,
        )
        .unwrap();
        assert_eq!(spec.filters[0].operator, FilterOp::In);
        assert_eq!(spec.filters[0].value, FilterValue::List(vec![Value::from("Ohio")]));
    }

    #[test]
    fn test_repaired_scalar_in_is_not_promoted() {
        let raw = json!({
            "type": "sum",
            "measure": "Sales",
            "dimension": "OrderDate",
            "filters": [{"column": "State", "operator": "IN", "value": "Ohio"}]
        });

        let spec = validate_query(&raw, Some("Ohio vs last year")).unwrap();
        assert!(!spec.multi_series);
        assert_eq!(spec.series_dimension, None);
        assert_eq!(spec.filters[0].value, FilterValue::List(vec![Value::from("Ohio")]));
    }

    #[test]
    fn test_like_wrapping_is_removed() {
        let like = |value: &str| {
            let raw = json!({"type": "count", "filters": [{"column": "Product", "operator": "like", "value": value}]});
            validate_query(&raw, None).unwrap().filters[0].value.clone()
        };

        assert_eq!(like("%chair%"), FilterValue::Scalar(Value::from("chair")));
        assert_eq!(like("50%"), FilterValue::Scalar(Value::from("50%")));
        assert_eq!(like("%"), FilterValue::Scalar(Value::from("%")));
        assert_eq!(like("%%"), FilterValue::Scalar(Value::from("%%")));
        assert_eq!(like("%50%%"), FilterValue::Scalar(Value::from("50%")));
    }

    #[test]
    fn test_series_dimension_dropped_without_flag() {
        let spec = validate_query(
            &json!({"type": "count", "dimension": "Region", "seriesDimension": "State"}),
            None,
        )
        .unwrap();
        assert_eq!(spec.series_dimension, None);
    }

    #[test]
    fn test_comparison_question_promoted() {
        let raw = json!({
            "type": "sum",
            "measure": "Sales",
            "dimension": "OrderDate",
            "filters": [{"column": "State", "operator": "IN", "value": ["Kentucky", "California"]}]
        });

        let spec = validate_query(&raw, Some("Kentucky vs California monthly sales")).unwrap();
        assert!(spec.multi_series);
        assert_eq!(spec.series_dimension.as_deref(), Some("State"));

        let plain = validate_query(&raw, Some("Kentucky and California monthly sales")).unwrap();
        assert!(!plain.multi_series);
    }

    #[test]
    fn test_intent_chart_type() {
        let intent = validate_intent(
            &json!({"chartType": "Line", "title": "Sales", "dataQuery": {"type": "count"}}),
            None,
        )
        .unwrap();
        assert_eq!(intent.chart_type, ChartType::Line);
        assert_eq!(intent.title.as_deref(), Some("Sales"));

        let err = validate_intent(&json!({"chartType": "radar", "dataQuery": {"type": "count"}}), None)
            .unwrap_err();
        assert_eq!(field_of(err), "chartType");

        let err = validate_intent(&json!({"chartType": "bar"}), None).unwrap_err();
        assert_eq!(field_of(err), "dataQuery");
    }

    #[test]
    fn test_bare_spec_is_a_bar_chart() {
        let intent = validate_intent(&json!({"type": "count", "dimension": "Region"}), None).unwrap();
        assert_eq!(intent.chart_type, ChartType::Bar);
        assert_eq!(intent.data_query.dimension.as_deref(), Some("Region"));
    }

    #[test]
    fn test_check_spec_on_typed_spec() {
        let mut spec = DataQuerySpec::count();
        spec.aggregation = AggregationType::Sum;
        assert_eq!(field_of(check_spec(&spec).unwrap_err()), "measure");
        assert!(check_spec(&DataQuerySpec::sum("Sales").split_by("State")).is_ok());
    }
}
