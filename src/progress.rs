use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over diffusion steps.  Does nothing when disabled.
pub struct CLProgressBar {
    pb: Option<ProgressBar>,
}

impl CLProgressBar {
    pub fn new(work: u64, enabled: bool) -> Self {
        let pb = if enabled {
            let pb = ProgressBar::new(work);
            let style = ProgressStyle::default_bar()
                .template("[{msg}] {wide_bar} {pos:>4}/{len:4} - Elapsed: {elapsed_precise}")
                .expect("Shouldn't fail!");

            pb.set_style(style);

            // Update in separate thread
            pb.enable_steady_tick(Duration::from_millis(200));
            Some(pb)
        } else {
            None
        };

        CLProgressBar { pb }
    }

    pub fn set_message(&self, message: &'static str) {
        if let Some(pb) = &self.pb {
            pb.set_message(message);
        }
    }

    pub fn inc(&self, amt: u64) {
        if let Some(pb) = &self.pb {
            pb.inc(amt);
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish();
        }
    }
}
