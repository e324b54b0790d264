//! CSV reports of learning curves, comparisons and tuning trials.
//!
//! Every file name carries a local timestamp so repeated experiments never
//! overwrite each other.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use time::{OffsetDateTime, format_description};
use tracing::info;

use crate::error::Result;
use crate::rl::RunStatistics;
use crate::stats::ComparisonResult;
use crate::tuning::Trial;

pub struct CsvReport {
    folder: PathBuf,
    stamp: String,
}

impl CsvReport {
    /// Creates `folder` if needed; the timestamp is taken once and shared by every file
    pub fn new(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref().to_path_buf();
        if !folder.exists() {
            std::fs::create_dir_all(&folder)?;
        }

        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let format = format_description::parse("[year][month][day]-[hour][minute][second]")
            .map_err(std::io::Error::other)?;
        let stamp = now.format(&format).map_err(std::io::Error::other)?;

        Ok(Self { folder, stamp })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    fn create(&self, label: &str) -> Result<(PathBuf, BufWriter<File>)> {
        let path = self.folder.join(format!("{} - {}.csv", label, self.stamp));
        let file = File::create(&path)?;
        Ok((path, BufWriter::new(file)))
    }

    /// `episode,mean,std`
    pub fn write_learning_curve(&self, label: &str, stats: &RunStatistics) -> Result<PathBuf> {
        let (path, mut out) = self.create(label)?;
        writeln!(out, "episode,mean,std")?;
        for (episode, (mean, std)) in stats.mean_steps.iter().zip(&stats.std_steps).enumerate() {
            writeln!(out, "{},{:.4},{:.4}", episode, mean, std)?;
        }
        out.flush()?;
        info!("Learning curve saved to {}", path.display());
        Ok(path)
    }

    /// One row per kept step
    pub fn write_comparison(&self, label: &str, result: &ComparisonResult) -> Result<PathBuf> {
        let (path, mut out) = self.create(label)?;
        writeln!(
            out,
            "step,central1,low1,high1,central2,low2,high2,p_value,significant"
        )?;
        for s in &result.steps {
            writeln!(
                out,
                "{},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.6},{}",
                s.step,
                s.central1,
                s.band1.0,
                s.band1.1,
                s.central2,
                s.band2.0,
                s.band2.1,
                s.p_value,
                s.significant
            )?;
        }
        out.flush()?;
        info!("Comparison saved to {}", path.display());
        Ok(path)
    }

    /// `alpha_critic,alpha_actor,score` in evaluation order
    pub fn write_trials(&self, label: &str, trials: &[Trial]) -> Result<PathBuf> {
        let (path, mut out) = self.create(label)?;
        writeln!(out, "alpha_critic,alpha_actor,score")?;
        for trial in trials {
            writeln!(
                out,
                "{:.6},{:.6},{:.6}",
                trial.params.alpha_critic, trial.params.alpha_actor, trial.score
            )?;
        }
        out.flush()?;
        info!("Tuning trials saved to {}", path.display());
        Ok(path)
    }
}
