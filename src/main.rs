fn main() {
    if let Err(err) = octopus_tado_sync::app::run() {
        eprintln!("sync run failed: {err}");
        std::process::exit(1);
    }
}
