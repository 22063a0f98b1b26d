/// A marker type indicating that a model is **not yet trained**.
///
/// Used as the state parameter of a model (e.g. `RandomForest<Unfitted>`):
/// only the unfitted state exposes `fit`, and inference methods are not
/// available until the model has become `Fitted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unfitted;

/// A marker type indicating that a model has been **fully trained**.
///
/// A `Fitted` model holds only inference parameters and can be serialized into
/// an artifact bundle or used for prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fitted;
