//! Command line front end for BundleGuard

pub mod cli;
pub mod logger;
pub mod settings;
pub mod signing;
pub mod xml_config;

pub use settings::{Settings, SettingsError, SettingsOverrides};
pub use signing::{JarSigner, Platform};
pub use xml_config::XmlConfig;
