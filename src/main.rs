use std::process;

use mimic::app::App;
use mimic::classify::Classifier;
use mimic::config::{Config, StartupError};
use mimic::estimator::HolisticEstimator;
use mimic::gallery::Gallery;
use mimic::gui;
use mimic::image::Resolution;
use mimic::video::{
    webcam::{Webcam, WebcamOptions},
    Camera, Disconnected,
};

fn main() {
    mimic::init_logger!();

    if let Err(e) = run() {
        let code = e.exit_code();
        if let Some(guidance) = e.guidance() {
            println!("{}", guidance);
        }
        eprintln!("error: {:?}", anyhow::Error::new(e));
        process::exit(code);
    }
}

fn run() -> Result<(), StartupError> {
    let config = Config::from_env().map_err(StartupError::Config)?;
    log::debug!("{:?}", config);

    let estimator = HolisticEstimator::load(&config.model_dir)?;

    let mut options = WebcamOptions::default().resolution(Resolution::RES_VGA);
    if let Some(name) = &config.webcam_name {
        options = options.name(name);
    }
    let camera: Box<dyn Camera> = match Webcam::open(options) {
        Ok(webcam) => Box::new(webcam),
        Err(e) => {
            log::error!("failed to open webcam: {:#}", e);
            Box::new(Disconnected)
        }
    };

    let gallery = Gallery::discover(&config.asset_dir);
    let app = App::new(
        camera,
        Box::new(estimator),
        Classifier::new(config.thresholds),
        gallery,
    );
    gui::run(app, config.tick_interval)
}
