//! Package writer adapter: Hands stored key packages to matching as files.
//!
//! Every package becomes a `.bin`/`.sig` pair inside a private temporary
//! directory. The directory itself is removed when the writer is dropped;
//! single files are removed through the returned `WrittenPackages`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::domain::{KeyPackage, RegionId, WrittenPackages};
use crate::ports::{PackageStore, PackageWriter};

/// Writes the packages of a `PackageStore` into a temporary directory.
pub struct TempDirPackageWriter<S>
where
    S: PackageStore,
{
    store: Arc<S>,
    root: TempDir,
}

impl<S> TempDirPackageWriter<S>
where
    S: PackageStore,
{
    /// Create a writer with a fresh temporary directory.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn new(store: Arc<S>) -> std::io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("exposure-risk-packages-")
            .tempdir()?;
        tracing::debug!("Writing key packages below {}", root.path().display());
        Ok(Self { store, root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    fn package_path(&self, package: &KeyPackage, extension: &str) -> PathBuf {
        let fingerprint = package.fingerprint();
        let name = match package.hour {
            Some(hour) => format!("{}-{}-{:02}-{}", package.region, package.day, hour, &fingerprint[..16]),
            None => format!("{}-{}-{}", package.region, package.day, &fingerprint[..16]),
        };
        self.root.path().join(name).with_extension(extension)
    }

    fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    /// Write one package. Files already written are tracked in `written`
    /// even if a later write fails.
    fn write_package(&self, package: &KeyPackage, written: &mut WrittenPackages) -> std::io::Result<()> {
        let bin_path = self.package_path(package, "bin");
        Self::write_file(&bin_path, &package.bin)?;
        written.absorb(WrittenPackages::new(vec![bin_path]));

        let sig_path = self.package_path(package, "sig");
        Self::write_file(&sig_path, &package.signature)?;
        written.absorb(WrittenPackages::new(vec![sig_path]));
        Ok(())
    }
}

impl<S> PackageWriter for TempDirPackageWriter<S>
where
    S: PackageStore,
{
    fn write_downloaded_packages(&self, region: &RegionId) -> Option<WrittenPackages> {
        let packages = match self.store.packages(region) {
            Ok(packages) => packages,
            Err(e) => {
                tracing::warn!("Failed to load key packages of {}: {}", region, e);
                return None;
            }
        };

        let mut written = WrittenPackages::default();
        for package in &packages {
            if let Err(e) = self.write_package(package, &mut written) {
                tracing::warn!("Failed to write key package {:?}: {}", package, e);
                // Dropping `written` removes what was already on disk
                return None;
            }
        }

        tracing::info!(
            "Wrote {} key packages of {} ({} files)",
            packages.len(),
            region,
            written.len()
        );
        Some(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteStore;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 10, d).expect("Valid date")
    }

    fn create_writer() -> (TempDirPackageWriter<SqliteStore>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        let writer = TempDirPackageWriter::new(Arc::clone(&store)).expect("Should create dir");
        (writer, store)
    }

    #[test]
    fn test_writes_bin_and_sig_per_package() {
        let (writer, store) = create_writer();
        let de = RegionId::new("DE");
        store
            .add_package(&KeyPackage::daily(de.clone(), day(1), vec![1, 2], vec![9]))
            .expect("Should add");
        store
            .add_package(&KeyPackage::hourly(de.clone(), day(2), 13, vec![3], vec![8]))
            .expect("Should add");

        let written = writer.write_downloaded_packages(&de).expect("Should write");

        assert_eq!(written.len(), 4);
        for path in written.paths() {
            assert!(path.starts_with(writer.root()));
            assert!(path.exists());
        }
        assert_eq!(fs::read(&written.paths()[0]).expect("Should read"), vec![1, 2]);
        assert_eq!(fs::read(&written.paths()[1]).expect("Should read"), vec![9]);
    }

    #[test]
    fn test_region_without_packages() {
        let (writer, _store) = create_writer();
        let written = writer
            .write_downloaded_packages(&RegionId::new("IT"))
            .expect("Should write");
        assert!(written.is_empty());
    }

    #[test]
    fn test_clean_up_removes_files() {
        let (writer, store) = create_writer();
        let de = RegionId::new("DE");
        store
            .add_package(&KeyPackage::daily(de.clone(), day(1), vec![1], vec![2]))
            .expect("Should add");

        let mut written = writer.write_downloaded_packages(&de).expect("Should write");
        let paths = written.paths().to_vec();
        written.clean_up();

        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[test]
    fn test_write_failure_returns_none() {
        let (writer, store) = create_writer();
        let de = RegionId::new("DE");
        store
            .add_package(&KeyPackage::daily(de.clone(), day(1), vec![1], vec![2]))
            .expect("Should add");

        let root = writer.root().to_path_buf();
        fs::remove_dir_all(&root).expect("Should remove");

        assert!(writer.write_downloaded_packages(&de).is_none());
    }
}
