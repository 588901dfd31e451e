//! Choose which changed files are sent to the scanning service.

use iacscan_core::{ChangedFile, ScanConfig};

/// Extension, folder and exclusion rules applied to changed files.
///
/// An empty `folder_path` matches every path and an empty `exclude_folder`
/// excludes nothing.
///
/// # Examples
///
/// ```
/// use iacscan_action::selector::FileSelector;
/// use iacscan_core::ScanConfig;
///
/// let selector = FileSelector::from_config(&ScanConfig::default());
/// assert!(selector.accepts("infra/main.tf"));
/// assert!(!selector.accepts("src/main.rs"));
/// ```
#[derive(Debug, Clone)]
pub struct FileSelector {
    extensions: Vec<String>,
    folder_path: String,
    exclude_folder: String,
}

impl FileSelector {
    /// Build a selector from explicit rules.
    pub fn new(
        extensions: Vec<String>,
        folder_path: impl Into<String>,
        exclude_folder: impl Into<String>,
    ) -> Self {
        Self {
            extensions,
            folder_path: folder_path.into(),
            exclude_folder: exclude_folder.into(),
        }
    }

    /// Build a selector from scan configuration.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.extensions.clone(),
            config.folder_path.clone(),
            config.exclude_folder.clone(),
        )
    }

    /// Check a single path against every rule.
    ///
    /// # Examples
    ///
    /// ```
    /// use iacscan_action::selector::FileSelector;
    ///
    /// let selector = FileSelector::new(vec![".tf".into()], "infra/", "infra/old");
    /// assert!(selector.accepts("infra/net/vpc.tf"));
    /// assert!(!selector.accepts("infra/old/vpc.tf"));
    /// assert!(!selector.accepts("modules/vpc.tf"));
    /// ```
    pub fn accepts(&self, path: &str) -> bool {
        let extension_ok = self.extensions.iter().any(|ext| path.ends_with(ext.as_str()));
        let folder_ok = path.contains(self.folder_path.as_str());
        let excluded = !self.exclude_folder.is_empty() && path.contains(self.exclude_folder.as_str());
        extension_ok && folder_ok && !excluded
    }

    /// Keep the accepted files, preserving input order.
    pub fn select(&self, files: &[ChangedFile]) -> Vec<ChangedFile> {
        files
            .iter()
            .filter(|f| self.accepts(&f.path))
            .cloned()
            .collect()
    }
}
