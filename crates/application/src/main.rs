mod config;

use config::AppConfig;
use schengine::error::EngineResult;
use schengine::window::WinitWindow;
use schengine::Engine;

fn main() {
    env_logger::init();

    if let Err(err) = run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    log::info!("schengine {}", schengine::version());

    let config = AppConfig::from_env()?;
    let window = WinitWindow::create(&config.window)?;
    let mut engine = Engine::initialize(window, config.backend, &config.engine)?;

    let frames = engine.run()?;
    // The engine needs the GPU idle before it's dropped, window last.
    engine.stop()?;
    log::info!("Presented {frames} frames");
    Ok(())
}
