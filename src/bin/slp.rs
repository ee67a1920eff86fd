use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "slp", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print summary counts of an archive snapshot.
    Info(InfoArgs),
    /// Extract one frame of one video as an image.
    Frame(FrameArgs),
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Input archive snapshot (JSON).
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input archive snapshot (JSON).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Video index within the archive.
    #[arg(long, default_value_t = 0)]
    video: usize,

    /// Frame index (0-based).
    #[arg(long)]
    frame: usize,

    /// Output image path; the format follows the extension.
    #[arg(long)]
    out: PathBuf,

    /// Directory searched for external video files that moved.
    #[arg(long)]
    search_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Info(args) => cmd_info(args),
        Command::Frame(args) => cmd_frame(args),
    }
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let opts = slp_io::ReadOpts {
        open_videos: false,
        ..Default::default()
    };
    let labels = slp_io::load_file(&args.in_path, &opts)
        .with_context(|| format!("read archive '{}'", args.in_path.display()))?;

    let predicted = labels
        .labeled_frames
        .iter()
        .flat_map(|f| f.instances.iter())
        .filter(|i| i.is_predicted())
        .count();
    println!("labeled frames: {}", labels.len());
    println!(
        "instances:      {} ({} user, {} predicted)",
        labels.num_instances(),
        labels.num_instances() - predicted,
        predicted
    );
    println!("tracks:         {}", labels.tracks.len());
    println!("suggestions:    {}", labels.suggestions.len());
    println!("sessions:       {}", labels.sessions.len());
    for (i, s) in labels.skeletons.iter().enumerate() {
        println!(
            "skeleton {i}:     {} ({} nodes, {} edges)",
            s.name.as_deref().unwrap_or("<unnamed>"),
            s.len(),
            s.edges().len()
        );
    }
    for (i, v) in labels.videos.iter().enumerate() {
        let source = match v.embedded_dataset() {
            Some(ds) => format!("embedded '{ds}'"),
            None => v.filename.primary().unwrap_or("<none>").to_string(),
        };
        let frames = labels.frames_for_video(slp_io::VideoIdx(i)).count();
        println!("video {i}:        {source} ({frames} labeled frames)");
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let opts = slp_io::ReadOpts {
        search_dir: args.search_dir.clone(),
        ..Default::default()
    };
    let labels = slp_io::load_file(&args.in_path, &opts)
        .with_context(|| format!("read archive '{}'", args.in_path.display()))?;
    let video = labels
        .video(slp_io::VideoIdx(args.video))
        .with_context(|| format!("archive has no video {}", args.video))?;
    anyhow::ensure!(
        video.backend().is_some(),
        "video {} could not be opened",
        args.video
    );
    let frame = video
        .get_frame(args.frame)
        .with_context(|| format!("frame {} of video {} is unavailable", args.frame, args.video))?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let color = if frame.channels == 1 {
        image::ColorType::L8
    } else {
        image::ColorType::Rgb8
    };
    image::save_buffer(&args.out, &frame.data, frame.width, frame.height, color)
        .with_context(|| format!("write image '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    for v in &labels.videos {
        v.close();
    }
    Ok(())
}
