//! Data model: source descriptors and the directives handlers produce

pub mod directive;
pub mod source;

pub use directive::{
    AttachDirective, Directive, DirectiveKind, OptionValue, ParamValue, SecretDirective,
    ViewDirective, ViewSource,
};
pub use source::{
    ComponentConfig, CredentialProvider, CustomSpec, DuckLakeSpec, FileSpec, LakeRole,
    PostgresSpec, S3Spec, SourceCategory, SourceConfig, SourceKind, SourceSpec, UrlStyle,
};
