//! Chart Query Contracts
//!
//! - **Types**: the `DataQuerySpec` and `ChartIntent` contracts
//! - **Validate**: untrusted JSON → typed, repaired spec
//! - **Predicate**: filters lowered to backend-neutral comparisons
//!
//! # Examples
//!
//! ## Building a spec
//!
//! ```rust
//! use chartwise::query::{DataQuerySpec, Filter};
//!
//! let spec = DataQuerySpec::sum("Sales")
//!     .group_by("OrderDate")
//!     .split_by("State")
//!     .filter(Filter::one_of("State", &["Kentucky", "California"]));
//! assert!(spec.multi_series);
//! ```
//!
//! ## Validating model output
//!
//! ```rust,ignore
//! let intent = validate_intent(&json, Some("Kentucky vs California sales"))?;
//! ```

mod predicate;
mod types;
mod validate;

pub use predicate::Predicate;
pub use types::{
    AggregationType, ChartIntent, ChartType, DataQuerySpec, Filter, FilterOp, FilterValue,
};
pub use validate::{check_spec, validate_intent, validate_query};
