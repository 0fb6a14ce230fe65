//! On-disk layout (spec.md §3's "invariants" subsection), centralized so no
//! other module hand-builds a path under `DATA_DIR`.

use ocrflow_ids::JobKey;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DataLayout {
    data_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn in_dir(&self) -> PathBuf {
        self.data_dir.join("in")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.data_dir.join("work")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.work_dir().join("_staging")
    }

    pub fn staging_path(&self, ts: &str, name: &str) -> PathBuf {
        self.staging_dir().join(format!("{ts}_{name}"))
    }

    pub fn job_dir(&self, job_key: &JobKey) -> PathBuf {
        self.work_dir().join(job_key.as_str())
    }

    pub fn job_state_path(&self, job_key: &JobKey) -> PathBuf {
        self.job_dir(job_key).join("state.json")
    }

    pub fn job_input_path(&self, job_key: &JobKey, input_name: &str) -> PathBuf {
        self.job_dir(job_key).join(input_name)
    }

    pub fn job_raw_pdf_path(&self, job_key: &JobKey) -> PathBuf {
        self.job_dir(job_key).join("raw.pdf")
    }

    pub fn job_final_pdf_path(&self, job_key: &JobKey) -> PathBuf {
        self.job_dir(job_key).join("final.pdf")
    }

    pub fn job_heartbeat_path(&self, job_key: &JobKey, stage: Stage) -> PathBuf {
        self.job_dir(job_key)
            .join(format!("{}.heartbeat", stage.as_str()))
    }

    pub fn job_log_path(&self, job_key: &JobKey, stage: Stage) -> PathBuf {
        self.job_dir(job_key).join(format!("{}.log", stage.as_str()))
    }

    pub fn out_dir(&self) -> PathBuf {
        self.data_dir.join("out")
    }

    pub fn out_path(&self, base: &str, job_key: &JobKey) -> PathBuf {
        self.out_dir().join(format!("{base}__job-{job_key}.pdf"))
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join("archive")
    }

    pub fn error_dir(&self) -> PathBuf {
        self.data_dir.join("error")
    }

    pub fn hold_duplicates_dir(&self) -> PathBuf {
        self.data_dir.join("hold").join("duplicates")
    }

    pub fn hold_duplicate_job_dir(&self, job_key: &JobKey) -> PathBuf {
        self.hold_duplicates_dir().join(job_key.as_str())
    }

    pub fn hold_duplicate_status_path(&self, job_key: &JobKey) -> PathBuf {
        self.hold_duplicate_job_dir(job_key).join("status.json")
    }

    pub fn hold_duplicate_decision_path(&self, job_key: &JobKey) -> PathBuf {
        self.hold_duplicate_job_dir(job_key).join("decision.json")
    }

    pub fn reports_duplicates_dir(&self) -> PathBuf {
        self.data_dir.join("reports").join("duplicates")
    }

    pub fn duplicate_report_path(&self, job_key: &JobKey) -> PathBuf {
        self.reports_duplicates_dir()
            .join(format!("{job_key}.json"))
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn index_jobs_path(&self) -> PathBuf {
        self.index_dir().join("jobs.json")
    }

    pub fn index_metrics_path(&self) -> PathBuf {
        self.index_dir().join("metrics.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Every top-level directory the orchestrator expects to exist.
    pub fn all_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.in_dir(),
            self.staging_dir(),
            self.work_dir(),
            self.out_dir(),
            self.archive_dir(),
            self.error_dir(),
            self.hold_duplicates_dir(),
            self.reports_duplicates_dir(),
            self.index_dir(),
            self.logs_dir(),
        ]
    }
}

/// The two external processing stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prep,
    Ocr,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Prep => "prep",
            Stage::Ocr => "ocr",
        }
    }
}
