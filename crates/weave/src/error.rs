use std::borrow::Cow;
use weave_container::ContainerError;
use weave_discovery::DiscoveryError;
use weave_patcher::PatchError;

/// Everything that can abort a build.
#[weave_derive::weave_error]
pub enum PipelineError {
    #[error("Container failure{}: {source}", format_context(.context))]
    Container { source: ContainerError, context: Option<Cow<'static, str>> },

    #[error("Discovery failure{}: {source}", format_context(.context))]
    Discovery { source: DiscoveryError, context: Option<Cow<'static, str>> },

    #[error("Patch failure{}: {source}", format_context(.context))]
    Patch { source: PatchError, context: Option<Cow<'static, str>> },

    /// Only raised when the configuration requires a registry.
    #[error("Registry class not found in any container{}: {message}", format_context(.context))]
    RegistryNotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Container task failed{}: {source}", format_context(.context))]
    Task { source: tokio::task::JoinError, context: Option<Cow<'static, str>> },

    #[error("Internal pipeline error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
