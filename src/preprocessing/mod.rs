//! Feature preprocessing.
//!
//! # Core Concepts
//!
//! - [`Transformer`] / [`FittedTransformer`]: per-column steps, unfitted and
//!   fitted.
//! - [`FeatureSchema`]: which columns are numeric, categorical or identifiers.
//! - [`TransformationPipeline`] → [`FittedPipeline`]: the composed
//!   record-to-feature-vector mapping shared by training and serving.
//!
//! # Available Steps
//!
//! ## Imputation
//! - [`SimpleImputer`]: training median (numeric)
//! - [`CategoricalImputer`]: most frequent label
//!
//! ## Scaling
//! - [`StandardScaler`]: zero mean, unit variance
//!
//! ## Encoding
//! - [`OneHotEncoder`]: sorted vocabulary, unseen labels encode as zeros

pub mod encoding;
pub mod imputation;
pub mod pipeline;
pub mod scaling;
pub mod schema;
pub mod traits;

pub use encoding::{FittedOneHotEncoder, OneHotEncoder};
pub use imputation::{
    CategoricalImputer, FittedCategoricalImputer, FittedSimpleImputer, SimpleImputer,
};
pub use pipeline::{
    CategoricalColumnParams, FittedPipeline, NumericColumnParams, TransformationPipeline,
    UnseenCategory,
};
pub use scaling::{FittedStandardScaler, StandardScaler};
pub use schema::{derive_schema, FeatureSchema};
pub use traits::{FittedTransformer, Transformer};
