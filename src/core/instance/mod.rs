pub mod model;
pub mod registry;

pub use model::{InstanceConfig, LoaderSpec, LoaderType, ServerEndpoint};
pub use registry::{InstanceRegistry, DEFAULT_INSTANCE_ID};
