use std::sync::LazyLock;

use crate::build_info::BUILD_INFO;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}-{}{}",
        env!("IMAGE_VERSION"),
        BUILD_INFO.commit_sha1.unwrap_or("unknown"),
        dirty_suffix(BUILD_INFO.git_dirty)
    )
});

fn dirty_suffix(git_dirty: Option<&str>) -> &'static str {
    if git_dirty == Some("true") {
        "-dirty"
    } else {
        ""
    }
}

/// Branch the binary was built from, if known.
pub fn branch() -> &'static str {
    BUILD_INFO.branch.unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_starts_with_image_version() {
        assert!(
            VERSION.starts_with(env!("IMAGE_VERSION")),
            "version should be prefixed by the image version"
        );
        assert!(!branch().is_empty());
    }

    #[test]
    fn only_a_dirty_tree_marks_the_version() {
        assert_eq!(dirty_suffix(Some("true")), "-dirty");
        assert_eq!(dirty_suffix(Some("false")), "");
        assert_eq!(dirty_suffix(None), "");
    }
}
