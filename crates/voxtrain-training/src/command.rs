use crate::config::TrainerConfig;
use crate::error::{TrainError, TrainResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use voxtrain_pipeline::{PipelineParams, WorkspaceLayout};

/// Hyperparameters for one training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HyperParams {
    pub epochs: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Emit a checkpoint every this many epochs.
    #[serde(default = "default_save_every")]
    pub save_every: u32,
}

fn default_batch_size() -> u32 {
    8
}

fn default_save_every() -> u32 {
    10
}

impl Default for HyperParams {
    fn default() -> Self {
        Self { epochs: 100, batch_size: default_batch_size(), save_every: default_save_every() }
    }
}

impl HyperParams {
    pub fn validate(&self) -> TrainResult<()> {
        if self.epochs == 0 {
            return Err(TrainError::InvalidHyperParams("epochs must be >= 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(TrainError::InvalidHyperParams("batch_size must be >= 1".to_string()));
        }
        if self.save_every == 0 {
            return Err(TrainError::InvalidHyperParams("save_every must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// A fully assembled trainer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

/// Build the trainer command line.
///
/// Flag contract of the wrapped training tool:
/// `-e` experiment, `-sr` sample-rate tag, `-f0` 0/1, `-bs` batch size,
/// `-g` device (`0` on the accelerator, `cpu` otherwise), `-te` total
/// epochs, `-se` save-every, `-pg`/`-pd` optional pretrained weights,
/// `-l 1` keep latest weights only, `-c 0` no on-device dataset caching.
#[must_use]
pub fn build_trainer_command(
    trainer: &TrainerConfig,
    layout: &WorkspaceLayout,
    experiment: &str,
    params: &PipelineParams,
    hyper: &HyperParams,
) -> TrainerCommand {
    let mut args = vec![trainer.train_script.display().to_string()];
    let mut kv = |flag: &str, value: String| {
        args.push(flag.to_string());
        args.push(value);
    };

    kv("-e", experiment.to_string());
    kv("-sr", sample_rate_tag(params.sample_rate));
    kv("-f0", if params.use_f0 { "1" } else { "0" }.to_string());
    kv("-bs", hyper.batch_size.to_string());
    kv("-g", if params.accelerator { "0" } else { "cpu" }.to_string());
    kv("-te", hyper.epochs.to_string());
    kv("-se", hyper.save_every.to_string());
    if let Some(generator) = &trainer.pretrained_generator {
        kv("-pg", generator.display().to_string());
    }
    if let Some(discriminator) = &trainer.pretrained_discriminator {
        kv("-pd", discriminator.display().to_string());
    }
    kv("-l", "1".to_string());
    kv("-c", "0".to_string());

    TrainerCommand {
        program: trainer.interpreter.clone(),
        args,
        workdir: layout.experiment_dir(experiment),
    }
}

/// The trainer names sample rates by tag ("40k"), not in Hz.
fn sample_rate_tag(rate: u32) -> String {
    match rate {
        32_000 => "32k".to_string(),
        40_000 => "40k".to_string(),
        48_000 => "48k".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn layout() -> (TempDir, WorkspaceLayout) {
        let temp = TempDir::new().unwrap();
        let layout = WorkspaceLayout::new(temp.path());
        (temp, layout)
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let no_epochs = HyperParams { epochs: 0, ..HyperParams::default() };
        assert!(no_epochs.validate().is_err());
        let no_batch = HyperParams { batch_size: 0, ..HyperParams::default() };
        assert!(no_batch.validate().is_err());
        assert!(HyperParams::default().validate().is_ok());
    }

    #[test]
    fn test_command_flags_for_accelerator_run() {
        let (_temp, layout) = layout();
        let params = PipelineParams { accelerator: true, ..PipelineParams::default() };
        let hyper = HyperParams { epochs: 200, batch_size: 4, save_every: 25 };

        let command =
            build_trainer_command(&TrainerConfig::default(), &layout, "alice", &params, &hyper);

        assert_eq!(command.program, PathBuf::from("python3"));
        assert_eq!(command.workdir, layout.experiment_dir("alice"));
        let args = command.args.join(" ");
        assert!(args.starts_with("tools/train.py -e alice -sr 40k -f0 1 -bs 4 -g 0 -te 200 -se 25"));
        assert!(args.ends_with("-l 1 -c 0"));
    }

    #[test]
    fn test_command_flags_for_cpu_run_without_f0() {
        let (_temp, layout) = layout();
        let params = PipelineParams {
            use_f0: false,
            sample_rate: 48_000,
            ..PipelineParams::default()
        };

        let command = build_trainer_command(
            &TrainerConfig::default(),
            &layout,
            "bob",
            &params,
            &HyperParams::default(),
        );

        let args = command.args.join(" ");
        assert!(args.contains("-sr 48k"));
        assert!(args.contains("-f0 0"));
        assert!(args.contains("-g cpu"));
        assert!(!args.contains("-pg"));
    }

    #[test]
    fn test_pretrained_weights_are_passed_through() {
        let (_temp, layout) = layout();
        let trainer = TrainerConfig {
            pretrained_generator: Some(PathBuf::from("weights/g.pth")),
            pretrained_discriminator: Some(PathBuf::from("weights/d.pth")),
            ..TrainerConfig::default()
        };

        let command = build_trainer_command(
            &trainer,
            &layout,
            "alice",
            &PipelineParams::default(),
            &HyperParams::default(),
        );

        let args = command.args.join(" ");
        assert!(args.contains("-pg weights/g.pth"));
        assert!(args.contains("-pd weights/d.pth"));
    }

    #[test]
    fn test_unusual_sample_rate_falls_back_to_hz() {
        assert_eq!(sample_rate_tag(40_000), "40k");
        assert_eq!(sample_rate_tag(44_100), "44100");
    }
}
