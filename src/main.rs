fn main() {
    if let Err(err) = covid_data_public::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
