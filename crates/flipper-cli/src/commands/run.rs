//! # Run Command
//!
//! Wire everything together and start the flipping loop.

#[cfg(feature = "gui-automation")]
pub async fn run(cli: &crate::cli::Cli) -> anyhow::Result<()> {
    use flipper_core::{
        Blacklist, DiagSink, Geometry, LandmarkSet, Orchestrator, TradeMachine,
    };
    use flipper_market::{ApiProvider, ListingClient};
    use flipper_vision::capture::{create_screen_capture, ScreenCapture};
    use flipper_vision::input::create_input_simulator;
    use flipper_vision::ocr::TesseractOcr;
    use flipper_vision::verify::{CorrectionTable, MismatchLog, NameVerifier};
    use tracing::info;

    let config = super::load_config(cli)?;
    let blacklist = Blacklist::load(config.paths.blacklist_path())?;
    let corrections = CorrectionTable::load(config.paths.corrections_path())?;
    let mismatches = MismatchLog::load(config.paths.mismatch_log_path())?;
    let landmarks = LandmarkSet::load(&config.game.templates_dir, config.game.match_tolerance)?;

    let capture = create_screen_capture();
    if !capture.is_available() {
        anyhow::bail!("screen capture is not available in this session");
    }
    let window = capture.find_window(&config.game.process_name).await?;
    info!(
        title = %window.title,
        width = window.region.width,
        height = window.region.height,
        "attached to game window"
    );

    let input = create_input_simulator()?;
    let ocr = TesseractOcr::new();

    let machine = TradeMachine::new(
        capture,
        input,
        ocr,
        landmarks,
        Geometry::default(),
        NameVerifier::new(corrections, mismatches),
        DiagSink::new(&config.paths.data_dir),
        window,
        config.timing.poll_timeout(),
        config.timing.poll_interval(),
    );

    let mut market = ApiProvider::with_base_url(&config.market.api_base);
    if !config.market.api_key.is_empty() {
        market = market.with_api_key(&config.market.api_key);
    }
    let listing = ListingClient::with_base_url(&config.market.listing_base);

    let mut orchestrator = Orchestrator::new(machine, market, listing, config, blacklist);

    tokio::select! {
        result = orchestrator.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }
    Ok(())
}

#[cfg(not(feature = "gui-automation"))]
pub async fn run(_cli: &crate::cli::Cli) -> anyhow::Result<()> {
    anyhow::bail!("this build has no GUI automation; rebuild with the gui-automation feature")
}
