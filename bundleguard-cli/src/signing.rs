//! `jarsigner` integration

use bundleguard_core::{BundleSigner, GuardError, Result, SigningCredentials};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::debug;

pub const DEBUG_KEYSTORE: &str = ".android/debug.keystore";
pub const DEBUG_STORE_PASSWORD: &str = "android";
pub const DEBUG_KEY_ALIAS: &str = "AndroidDebugKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    /// Platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    fn jarsigner_name(self) -> &'static str {
        match self {
            Platform::Windows => "jarsigner.exe",
            Platform::Unix => "jarsigner",
        }
    }
}

/// Looks for `bin/jarsigner` under `java_home`, then under its parent for a
/// JRE layout. Falls back to the bare name resolved through `PATH`.
pub fn jarsigner_executable(java_home: Option<&Path>, platform: Platform) -> PathBuf {
    let name = platform.jarsigner_name();
    if let Some(home) = java_home {
        let candidates = [Some(home), home.parent()];
        for dir in candidates.into_iter().flatten() {
            let candidate = dir.join("bin").join(name);
            if candidate.is_file() {
                return candidate;
            }
        }
    }
    PathBuf::from(name)
}

/// The debug keystore, preferring `ANDROID_SDK_HOME` over `HOME`.
pub fn debug_keystore(android_sdk_home: Option<&Path>, home: Option<&Path>) -> Option<PathBuf> {
    [android_sdk_home, home]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(DEBUG_KEYSTORE))
        .find(|path| path.is_file())
}

/// Android debug credentials, when a debug keystore exists.
pub fn debug_signing_credentials(
    android_sdk_home: Option<&Path>,
    home: Option<&Path>,
) -> Option<SigningCredentials> {
    let store = debug_keystore(android_sdk_home, home)?;
    SigningCredentials::new(store, DEBUG_STORE_PASSWORD, DEBUG_KEY_ALIAS, DEBUG_STORE_PASSWORD).ok()
}

/// Signs bundles by running `jarsigner`. Passwords go through temporary
/// files so they never appear on the command line.
#[derive(Debug, Clone)]
pub struct JarSigner {
    executable: PathBuf,
}

impl JarSigner {
    /// Signer running `executable`.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn arguments(
        &self,
        bundle: &Path,
        credentials: &SigningCredentials,
        store_password_file: &Path,
        key_password_file: &Path,
    ) -> Vec<PathBuf> {
        vec![
            PathBuf::from("-keystore"),
            credentials.store_file.clone(),
            PathBuf::from("-storepass:file"),
            store_password_file.to_path_buf(),
            PathBuf::from("--keypass:file"),
            key_password_file.to_path_buf(),
            bundle.to_path_buf(),
            PathBuf::from(&credentials.key_alias),
        ]
    }
}

fn password_file(password: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(password.as_bytes())?;
    file.flush()?;
    Ok(file)
}

impl BundleSigner for JarSigner {
    fn sign(&self, bundle: &Path, credentials: &SigningCredentials) -> Result<()> {
        credentials.validate()?;
        if !credentials.store_file.is_file() {
            return Err(GuardError::Signing(format!(
                "keystore {} does not exist",
                credentials.store_file.display()
            )));
        }

        let store_password = password_file(&credentials.store_password)?;
        let key_password = password_file(&credentials.key_password)?;
        let args = self.arguments(bundle, credentials, store_password.path(), key_password.path());

        debug!(executable = %self.executable.display(), bundle = %bundle.display(), "invoking jarsigner");
        let output = Command::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|e| {
                GuardError::Signing(format!("failed to run {}: {}", self.executable.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(GuardError::Signing(format!(
                "{} failed with {}: {}",
                self.executable.display(),
                output.status,
                detail.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_jarsigner_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let jre = dir.path().join("jre");
        fs::create_dir_all(dir.path().join("bin")).unwrap();
        fs::create_dir_all(&jre).unwrap();
        fs::write(dir.path().join("bin").join("jarsigner"), b"").unwrap();

        assert_eq!(
            jarsigner_executable(Some(dir.path()), Platform::Unix),
            dir.path().join("bin").join("jarsigner")
        );
        assert_eq!(
            jarsigner_executable(Some(jre.as_path()), Platform::Unix),
            dir.path().join("bin").join("jarsigner")
        );
        assert_eq!(
            jarsigner_executable(Some(jre.as_path()), Platform::Windows),
            PathBuf::from("jarsigner.exe")
        );
        assert_eq!(jarsigner_executable(None, Platform::Unix), PathBuf::from("jarsigner"));
    }

    #[test]
    fn test_debug_keystore_prefers_sdk_home() {
        let sdk = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        assert_eq!(debug_keystore(Some(sdk.path()), Some(home.path())), None);

        fs::create_dir_all(home.path().join(".android")).unwrap();
        fs::write(home.path().join(DEBUG_KEYSTORE), b"ks").unwrap();
        assert_eq!(
            debug_keystore(Some(sdk.path()), Some(home.path())),
            Some(home.path().join(DEBUG_KEYSTORE))
        );

        fs::create_dir_all(sdk.path().join(".android")).unwrap();
        fs::write(sdk.path().join(DEBUG_KEYSTORE), b"ks").unwrap();
        let credentials = debug_signing_credentials(Some(sdk.path()), Some(home.path())).unwrap();
        assert_eq!(credentials.store_file, sdk.path().join(DEBUG_KEYSTORE));
        assert_eq!(credentials.key_alias, DEBUG_KEY_ALIAS);
        assert_eq!(credentials.store_password, "android");
    }

    #[test]
    fn test_arguments_keep_passwords_off_the_command_line() {
        let signer = JarSigner::new("jarsigner");
        let credentials = SigningCredentials::new("upload.jks", "store-secret", "upload", "key-secret").unwrap();
        let args = signer.arguments(
            Path::new("app.aab"),
            &credentials,
            Path::new("/tmp/store"),
            Path::new("/tmp/key"),
        );
        let rendered: Vec<String> = args.iter().map(|a| a.display().to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "-keystore",
                "upload.jks",
                "-storepass:file",
                "/tmp/store",
                "--keypass:file",
                "/tmp/key",
                "app.aab",
                "upload",
            ]
        );
        assert!(!rendered.iter().any(|a| a.contains("secret")));
    }

    #[test]
    fn test_missing_keystore_fails_before_running() {
        let signer = JarSigner::new("/nonexistent/jarsigner");
        let credentials = SigningCredentials::new("/nonexistent/upload.jks", "a", "b", "c").unwrap();
        let err = signer.sign(Path::new("app.aab"), &credentials).unwrap_err();
        assert!(matches!(err, GuardError::Signing(ref m) if m.contains("keystore")));
    }
}
