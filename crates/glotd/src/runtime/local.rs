//! Runtime backed by driver images unpacked on the local filesystem.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use glot_driver::{DriverCommand, ProcessDriver, instance_id};
use glot_pool::{DriverError, PooledDriver};

use super::{
    DRIVER_LOG_FORMAT_ENV, DRIVER_LOG_LEVEL_ENV, DriverImage, InstanceOptions, Runtime,
    RuntimeError,
};

const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");
const DRIVER_EXECUTABLE: &str = "bin/driver";

/// Runtime that launches `<root>/<org>/<name>/<tag>/bin/driver` processes.
#[derive(Debug, Clone)]
pub struct LocalRuntime {
    root: Utf8PathBuf,
}

impl LocalRuntime {
    /// Creates a runtime rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the installed image.
    #[must_use]
    pub fn image_dir(&self, image: &DriverImage) -> Utf8PathBuf {
        let mut dir = self.root.clone();
        for segment in image.organisation().split('/') {
            dir.push(segment);
        }
        dir.push(image.repository());
        dir.push(image.tag());
        dir
    }

    /// Path of the driver executable inside the installed image.
    #[must_use]
    pub fn executable(&self, image: &DriverImage) -> Utf8PathBuf {
        self.image_dir(image).join(DRIVER_EXECUTABLE)
    }
}

impl Runtime for LocalRuntime {
    fn resolve_image(&self, reference: &str) -> Result<DriverImage, RuntimeError> {
        Ok(reference.parse()?)
    }

    fn install_driver(&self, image: &DriverImage, force: bool) -> Result<(), RuntimeError> {
        let path = self.executable(image);
        if force {
            info!(target: RUNTIME_TARGET, image = %image, "re-verifying driver image");
        }
        verify_executable(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => RuntimeError::NotInstalled {
                image: image.name(),
                path: path.clone(),
            },
            _ => RuntimeError::Inspect {
                path: path.clone(),
                source,
            },
        })?;
        debug!(target: RUNTIME_TARGET, image = %image, %path, "driver image installed");
        Ok(())
    }

    fn new_instance(
        &self,
        language: &str,
        image: &DriverImage,
        options: &InstanceOptions,
    ) -> Result<Box<dyn PooledDriver>, DriverError> {
        let command = DriverCommand::new(self.executable(image).into_std_path_buf())
            .env(DRIVER_LOG_LEVEL_ENV, options.log_level.as_str())
            .env(DRIVER_LOG_FORMAT_ENV, options.log_format.to_string())
            .with_working_dir(self.image_dir(image).into_std_path_buf());
        Ok(Box::new(ProcessDriver::new(instance_id(language), command)))
    }
}

fn verify_executable(path: &Utf8Path) -> io::Result<()> {
    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{path} is not a file"),
        ));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{path} is not executable"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    struct Installed {
        _root: TempDir,
        runtime: LocalRuntime,
    }

    #[fixture]
    fn installed() -> Installed {
        let root = tempfile::tempdir().expect("temp dir");
        let utf8 = Utf8PathBuf::from_path_buf(root.path().to_path_buf()).expect("utf8 temp dir");
        let runtime = LocalRuntime::new(utf8);
        Installed {
            _root: root,
            runtime,
        }
    }

    fn image(reference: &str) -> DriverImage {
        reference.parse().expect("valid reference")
    }

    fn install_executable(runtime: &LocalRuntime, image: &DriverImage) {
        let path = runtime.executable(image);
        let parent = path.parent().expect("executable has a parent");
        fs::create_dir_all(parent).expect("create image dir");
        fs::write(&path, "#!/bin/sh\n").expect("write driver");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        }
    }

    #[rstest]
    fn lays_out_images_by_name_and_tag(installed: Installed) {
        let image = image("docker://bblfsh/python-driver:v2");

        let path = installed.runtime.executable(&image);

        assert!(path.ends_with("bblfsh/python-driver/v2/bin/driver"));
    }

    #[rstest]
    fn missing_image_is_not_installed(installed: Installed) {
        let image = image("docker://bblfsh/cobol-driver:latest");

        let error = installed
            .runtime
            .install_driver(&image, false)
            .expect_err("nothing installed");

        assert!(matches!(error, RuntimeError::NotInstalled { .. }));
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn installed_image_verifies(installed: Installed, #[case] force: bool) {
        let image = image("docker-daemon:bblfsh/python-driver:latest");
        install_executable(&installed.runtime, &image);

        installed
            .runtime
            .install_driver(&image, force)
            .expect("installed image verifies");
    }

    #[cfg(unix)]
    #[rstest]
    fn non_executable_driver_is_rejected(installed: Installed) {
        let image = image("docker://bblfsh/go-driver:latest");
        let path = installed.runtime.executable(&image);
        fs::create_dir_all(path.parent().expect("parent")).expect("create image dir");
        fs::write(&path, "not a program").expect("write driver");

        let error = installed
            .runtime
            .install_driver(&image, false)
            .expect_err("not executable");

        assert!(matches!(error, RuntimeError::Inspect { .. }));
    }

    #[rstest]
    fn new_instances_get_language_scoped_ids(installed: Installed) {
        let image = image("docker://bblfsh/python-driver:latest");

        let driver = installed
            .runtime
            .new_instance("python", &image, &InstanceOptions::default())
            .expect("construct instance");

        assert!(driver.id().starts_with("python-"));
    }
}
