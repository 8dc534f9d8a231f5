#![allow(clippy::missing_docs_in_private_items)]

pub mod fetcher;
pub mod loader;
pub mod normalizer;

pub use loader::{
    DefaultLoaderServices, LoadReport, LoaderConfig, LoaderObserver, LoaderServices,
    ResumableLoader, TracingObserver,
};
