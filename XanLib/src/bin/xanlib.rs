fn main() -> anyhow::Result<()> {
    xanlib::cli::run_cli()
}
