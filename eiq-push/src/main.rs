fn main() {
    if let Err(err) = octopus_tado_sync::app::run_push_total() {
        eprintln!("eiq push failed: {err}");
        std::process::exit(1);
    }
}
