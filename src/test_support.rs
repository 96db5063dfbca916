use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

pub(crate) const TEST_CONFIG: &str = r#"max_window: 2
hooks:
  generate:
    - script: "builtin:echo"
"#;

pub(crate) const TEST_THEME: &str = r#"wildcards:
  role: [manager, intern, clerk]
"#;

/// Root: role (theme, 3 values) x tone (3 values) = 9 compositions, 4 buckets.
/// Child: topic (2 values) = 2 compositions, 1 bucket.
pub(crate) const TEST_JOB: &str = r#"themes: [office]
operations:
  polite:
    tone:
      formal: "丁寧"
prompts:
  - text: "A {tone} memo from the {role}"
    wildcards:
      tone: [casual, formal, urgent]
    children:
      - text: "Follow-up: {topic}"
        wildcards:
          topic: [budget, hiring]
"#;

/// A project with `promptfan.yaml`, `themes/office.yaml` and `jobs/demo.yaml`.
pub(crate) fn create_test_project() -> TempDir {
    create_project(TEST_CONFIG)
}

/// Same layout with a custom `promptfan.yaml`.
pub(crate) fn create_project(config: &str) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    std::fs::write(path.join("promptfan.yaml"), config).unwrap();
    std::fs::create_dir_all(path.join("themes")).unwrap();
    std::fs::write(path.join("themes").join("office.yaml"), TEST_THEME).unwrap();
    std::fs::create_dir_all(path.join("jobs")).unwrap();
    std::fs::write(path.join("jobs").join("demo.yaml"), TEST_JOB).unwrap();

    temp_dir
}
