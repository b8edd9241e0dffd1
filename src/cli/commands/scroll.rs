//! Scroll animation commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{OutputFormat, print_formatted, print_success};
use crate::config::Config;
use crate::scroll::{ScrollFrame, ScrollTracker};

#[derive(Subcommand, Debug)]
pub enum ScrollCommands {
    /// Compute the header frame for a scroll offset
    Frame {
        /// Distance scrolled from the top, in pixels
        #[arg(allow_hyphen_values = true, required_unless_present = "reset")]
        offset: Option<i32>,

        /// Show the resting frame used when the list cannot scroll
        #[arg(long, conflicts_with = "offset")]
        reset: bool,
    },

    /// Scroll from the top until the header is collapsed, printing every frame
    Sweep {
        /// Pixels per scroll event
        #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(i32).range(1..))]
        step: i32,

        /// Start from the scroll position saved by the last sweep
        #[arg(long)]
        resume: bool,
    },
}

#[derive(Serialize)]
struct SweepRow {
    offset_top: i32,
    #[serde(flatten)]
    frame: ScrollFrame,
}

pub async fn run(command: ScrollCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    match command {
        ScrollCommands::Frame { offset, reset } => frame(offset, reset, format),
        ScrollCommands::Sweep { step, resume } => sweep(step, resume, format, quiet),
    }
}

fn frame(offset: Option<i32>, reset: bool, format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let offset = if reset { None } else { offset };
    let frame = config.scroll.frame(offset);

    print_formatted(&frame, format, format_frame);
    Ok(())
}

fn sweep(step: i32, resume: bool, format: OutputFormat, quiet: bool) -> Result<()> {
    let mut config = Config::load()?;
    let mut tracker = if resume {
        ScrollTracker::restore(config.scroll, config.session.scroll_factor)
    } else {
        ScrollTracker::new(config.scroll)
    };

    let rows = sweep_rows(&mut tracker, config.scroll.initial_offset, step);

    match format {
        OutputFormat::Json => print_formatted(&rows, format, |_| String::new()),
        OutputFormat::Text => {
            println!("{:>7}  {}", "offset", FRAME_HEADER);
            for row in &rows {
                println!("{:>7}  {}", row.offset_top, format_frame_row(&row.frame));
            }
        }
    }

    config.session.scroll_factor = tracker.scroll_factor();
    config.save()?;
    print_success(
        &format!("Saved scroll factor {:.2}", config.session.scroll_factor),
        quiet || format == OutputFormat::Json,
    );
    Ok(())
}

/// Feed `step`-sized scroll events until the tracker reaches `until`
fn sweep_rows(tracker: &mut ScrollTracker, until: i32, step: i32) -> Vec<SweepRow> {
    let mut rows = Vec::new();
    while tracker.offset_top() < until {
        let frame = tracker.on_scrolled(step, true);
        rows.push(SweepRow {
            offset_top: tracker.offset_top(),
            frame,
        });
    }
    rows
}

const FRAME_HEADER: &str = "effect  padding  image  emphasis  item  fade  toolbar  progress";

fn format_frame_row(frame: &ScrollFrame) -> String {
    format!(
        "{:>6.3}  {:>7}  {:>5}  {:>8.3}  {:>4}  {:>4.2}  {:>7}  {:>8}",
        frame.effective,
        frame.top_padding,
        frame.image_size,
        frame.emphasis_alpha,
        frame.item_offset_top,
        frame.secondary_fade,
        if frame.toolbar_active { "active" } else { "hidden" },
        frame.progress_height,
    )
}

fn format_frame(frame: &ScrollFrame) -> String {
    [
        format!("Effective:       {:.3}", frame.effective),
        format!("Top padding:     {}", frame.top_padding),
        format!("Image size:      {}", frame.image_size),
        format!("Emphasis alpha:  {:.3}", frame.emphasis_alpha),
        format!("Item offset:     {}", frame.item_offset_top),
        format!("Secondary fade:  {:.3}", frame.secondary_fade),
        format!(
            "Toolbar:         {:.3} ({})",
            frame.toolbar_opacity,
            if frame.toolbar_active { "active" } else { "hidden" }
        ),
        format!("Skip alpha:      {:.3}", frame.skip_alpha),
        format!(
            "Progress:        {} px, alpha {:.3}",
            frame.progress_height, frame.progress_alpha
        ),
    ]
    .join("\n")
}
