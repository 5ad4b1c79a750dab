//! Aquarium scene: `aquarium [config.json]`.

use std::path::PathBuf;

use diorama::config::{self, AquariumConfig};
use diorama::{random, Aquarium, Viewport};

fn main() {
    diorama::app::init_logging();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config: AquariumConfig = match config::load_or_default(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let viewport = Viewport::new(config.window.width as f32, config.window.height as f32);
    let mut rng = random::from_entropy();
    let aquarium = Aquarium::new(config.clone(), viewport, &mut rng);

    if let Err(e) = diorama::run(aquarium, &config.window) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
