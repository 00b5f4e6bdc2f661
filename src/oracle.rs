//! Mtime-based incremental skip check: decides whether a task's recorded
//! outputs are already newer than all of its inputs, so the scheduler can
//! skip re-running it.

use std::fs;
use std::time::SystemTime;

use camino::Utf8Path;

/// Decides whether a task can be skipped given its resolved input/output
/// paths.
pub(crate) struct IncrementalOracle;

impl IncrementalOracle {
    /// A task with no declared outputs is always considered stale (it has no
    /// artifact of completion to check against, so it always runs). A task
    /// with outputs is up to date when every output exists and either it has
    /// no inputs, or the oldest output is newer than the youngest input.
    /// Missing paths are treated as having an mtime of the Unix epoch.
    pub fn up_to_date(inputs: &[impl AsRef<Utf8Path>], outputs: &[impl AsRef<Utf8Path>]) -> bool {
        if outputs.is_empty() {
            return false;
        }
        if !outputs.iter().all(|p| p.as_ref().exists()) {
            return false;
        }
        if inputs.is_empty() {
            return true;
        }

        let oldest_output = outputs.iter().map(|p| mtime_or_epoch(p.as_ref())).min().unwrap();
        let youngest_input = inputs.iter().map(|p| mtime_or_epoch(p.as_ref())).max().unwrap();
        oldest_output > youngest_input
    }
}

fn mtime_or_epoch(path: &Utf8Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use filetime::{set_file_mtime, FileTime};
    use std::fs::File;
    use tempfile::tempdir;

    fn touch_with_offset(path: &Utf8Path, seconds_from_epoch: i64) {
        File::create(path).unwrap();
        set_file_mtime(path, FileTime::from_unix_time(seconds_from_epoch, 0)).unwrap();
    }

    #[test]
    fn task_with_no_outputs_always_runs() {
        let inputs: Vec<Utf8PathBuf> = vec![];
        let outputs: Vec<Utf8PathBuf> = vec![];
        assert!(!IncrementalOracle::up_to_date(&inputs, &outputs));
    }

    #[test]
    fn missing_output_is_stale() {
        let dir = tempdir().unwrap();
        let base = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let output = base.join("does-not-exist");
        assert!(!IncrementalOracle::up_to_date(&[] as &[Utf8PathBuf], &[output]));
    }

    #[test]
    fn output_older_than_input_is_stale() {
        let dir = tempdir().unwrap();
        let base = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let input = base.join("in.txt");
        let output = base.join("out.txt");
        touch_with_offset(&output, 1_000);
        touch_with_offset(&input, 2_000);
        assert!(!IncrementalOracle::up_to_date(&[input], &[output]));
    }

    #[test]
    fn output_newer_than_input_is_fresh() {
        let dir = tempdir().unwrap();
        let base = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let input = base.join("in.txt");
        let output = base.join("out.txt");
        touch_with_offset(&input, 1_000);
        touch_with_offset(&output, 2_000);
        assert!(IncrementalOracle::up_to_date(&[input], &[output]));
    }

    #[test]
    fn output_with_no_inputs_is_fresh_once_it_exists() {
        let dir = tempdir().unwrap();
        let base = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let output = base.join("out.txt");
        touch_with_offset(&output, 1_000);
        assert!(IncrementalOracle::up_to_date(&[] as &[Utf8PathBuf], &[output]));
    }
}
