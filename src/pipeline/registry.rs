//! The host-facing operation registry.
//!
//! A node-graph host drives this crate through three named operations:
//! `apply_censor`, `build_label_filter`, and `load_model`. Instead of an
//! ambient global table of node classes, the registry is an explicit
//! object owning the name-to-operation mapping; the host constructs it
//! once at startup and dispatches requests through it by reference.
//!
//! Requests and responses are typed enums so dispatch stays type-safe:
//! a request of the wrong shape for the named operation is rejected, and
//! response accessors convert back to the concrete payload.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbImage;

use crate::core::config::CensorConfig;
use crate::core::errors::{CensorError, CensorResult};
use crate::core::inference::{DetectionModel, ModelDir};
use crate::labels::{LabelFilter, NUM_CLASSES};
use crate::pipeline::NudityCensor;

/// Typed input for one host operation.
#[derive(Debug)]
pub enum OpRequest {
    /// Run the censoring pipeline over a batch of images.
    ApplyCensor {
        /// The loaded detection model.
        model: Arc<DetectionModel>,
        /// The image batch; output preserves its order.
        images: Vec<RgbImage>,
        /// Censor method and thresholds for this invocation.
        config: CensorConfig,
        /// Class exemptions for this invocation.
        filter: LabelFilter,
    },
    /// Build a label filter from one `censor` toggle per class id.
    BuildLabelFilter {
        /// `censor[id] == true` keeps class `id` censored; `false`
        /// exempts it.
        censor: [bool; NUM_CLASSES],
    },
    /// Load a detection model by file name from the model directory.
    LoadModel {
        /// Model file name, resolved against the registry's model directory.
        model_name: String,
    },
}

impl OpRequest {
    /// The operation name this request shape belongs to.
    pub fn operation(&self) -> &'static str {
        match self {
            OpRequest::ApplyCensor { .. } => OperationRegistry::APPLY_CENSOR,
            OpRequest::BuildLabelFilter { .. } => OperationRegistry::BUILD_LABEL_FILTER,
            OpRequest::LoadModel { .. } => OperationRegistry::LOAD_MODEL,
        }
    }
}

/// Typed output of one host operation.
#[derive(Debug)]
pub enum OpResponse {
    /// Censored image batch from `apply_censor`.
    Images(Vec<RgbImage>),
    /// Filter built by `build_label_filter`.
    LabelFilter(LabelFilter),
    /// Model handle loaded by `load_model`.
    Model(Arc<DetectionModel>),
}

impl OpResponse {
    /// The response variant name, for error messages.
    fn variant_name(&self) -> &'static str {
        match self {
            OpResponse::Images(_) => "Images",
            OpResponse::LabelFilter(_) => "LabelFilter",
            OpResponse::Model(_) => "Model",
        }
    }

    /// Extracts the censored image batch if this is an `Images` response.
    pub fn into_images(self) -> CensorResult<Vec<RgbImage>> {
        match self {
            OpResponse::Images(images) => Ok(images),
            other => Err(CensorError::invalid_input(format!(
                "expected an Images response, got {}",
                other.variant_name()
            ))),
        }
    }

    /// Extracts the label filter if this is a `LabelFilter` response.
    pub fn into_label_filter(self) -> CensorResult<LabelFilter> {
        match self {
            OpResponse::LabelFilter(filter) => Ok(filter),
            other => Err(CensorError::invalid_input(format!(
                "expected a LabelFilter response, got {}",
                other.variant_name()
            ))),
        }
    }

    /// Extracts the model handle if this is a `Model` response.
    pub fn into_model(self) -> CensorResult<Arc<DetectionModel>> {
        match self {
            OpResponse::Model(model) => Ok(model),
            other => Err(CensorError::invalid_input(format!(
                "expected a Model response, got {}",
                other.variant_name()
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    ApplyCensor,
    BuildLabelFilter,
    LoadModel,
}

/// Registry of the operations a host can invoke on this crate.
///
/// Constructed once at process start and passed by reference to the host
/// adapter. The three standard operations are the crate's entire
/// externally invocable surface.
#[derive(Debug)]
pub struct OperationRegistry {
    model_dir: ModelDir,
    operations: HashMap<&'static str, OpKind>,
}

impl OperationRegistry {
    /// Name of the batch censoring operation.
    pub const APPLY_CENSOR: &'static str = "apply_censor";
    /// Name of the label-filter construction operation.
    pub const BUILD_LABEL_FILTER: &'static str = "build_label_filter";
    /// Name of the model loading operation.
    pub const LOAD_MODEL: &'static str = "load_model";

    /// Creates a registry with the three standard operations, resolving
    /// models from `model_dir`.
    pub fn new(model_dir: ModelDir) -> Self {
        let operations = HashMap::from([
            (Self::APPLY_CENSOR, OpKind::ApplyCensor),
            (Self::BUILD_LABEL_FILTER, OpKind::BuildLabelFilter),
            (Self::LOAD_MODEL, OpKind::LoadModel),
        ]);
        Self {
            model_dir,
            operations,
        }
    }

    /// The registered operation names, sorted.
    pub fn operation_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Dispatches a request to a named operation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown operation name, `InvalidInput`
    /// when the request shape does not match the named operation, and
    /// propagates any error from the operation itself.
    pub fn dispatch(&self, operation: &str, request: OpRequest) -> CensorResult<OpResponse> {
        let kind = self.operations.get(operation).ok_or_else(|| {
            CensorError::config_error(format!("unknown operation: '{operation}'"))
        })?;

        match (kind, request) {
            (
                OpKind::ApplyCensor,
                OpRequest::ApplyCensor {
                    model,
                    images,
                    config,
                    filter,
                },
            ) => {
                let censor = NudityCensor::new(model, config, filter)?;
                Ok(OpResponse::Images(censor.censor(images)?))
            }
            (OpKind::BuildLabelFilter, OpRequest::BuildLabelFilter { censor }) => {
                Ok(OpResponse::LabelFilter(LabelFilter::from_toggles(censor)))
            }
            (OpKind::LoadModel, OpRequest::LoadModel { model_name }) => {
                Ok(OpResponse::Model(self.model_dir.load(&model_name)?))
            }
            (_, request) => Err(CensorError::invalid_input(format!(
                "request for operation '{}' dispatched to '{operation}'",
                request.operation()
            ))),
        }
    }
}
