//! Check ffmpeg availability and show the effective configuration.

use framecast_common::config::{config_file_path, AppConfig};
use framecast_render_engine::ffmpeg::command_exists;
use framecast_render_engine::{FfmpegPipeline, RenderPipeline};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Framecast System Check");
    println!("{}", "=".repeat(50));

    let pipeline = FfmpegPipeline::new(&config.render);
    let mut ready = true;
    for (binary, available) in [
        ("ffmpeg", pipeline.is_available()),
        ("ffprobe", command_exists("ffprobe")),
    ] {
        if available {
            println!("[OK] {binary} found");
        } else {
            println!("[MISSING] {binary} not found on PATH");
            ready = false;
        }
    }

    println!();
    println!("Config file: {}", config_file_path().display());
    match config.validate() {
        Ok(()) => println!("[OK] Configuration is valid"),
        Err(e) => {
            println!("[ERROR] {e}");
            ready = false;
        }
    }

    let render = &config.render;
    println!(
        "  Encode: {} fps, crf {}, preset {}",
        render.fps, render.crf, render.preset
    );
    println!(
        "  Workers: {}, pauses: {}ms / {}ms",
        render.max_concurrent_jobs, render.stage_pause_ms, render.terminal_delay_ms
    );
    println!("  Asset root: {}", render.asset_root.display());
    println!("  Storage: {:?} ({})", config.storage.backend, storage_target(config));
    println!(
        "  Persistence: {:?} ({})",
        config.persistence.backend,
        persistence_target(config)
    );
    println!("  Listen: {}:{}", config.server.host, config.server.port);

    println!();
    if ready {
        println!("Framecast is ready to render.");
    } else {
        println!("Some requirements are missing. See above.");
    }
    Ok(())
}

fn storage_target(config: &AppConfig) -> String {
    match config.storage.backend {
        framecast_common::config::StorageBackend::Local => {
            config.storage.local_dir.display().to_string()
        }
        framecast_common::config::StorageBackend::Tus => {
            format!("{} bucket {}", config.storage.endpoint, config.storage.bucket)
        }
    }
}

fn persistence_target(config: &AppConfig) -> String {
    match config.persistence.backend {
        framecast_common::config::PersistenceBackend::Jsonl => {
            config.persistence.jsonl_path.display().to_string()
        }
        framecast_common::config::PersistenceBackend::Rest => {
            format!("{} table {}", config.persistence.endpoint, config.persistence.table)
        }
    }
}
