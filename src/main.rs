fn main() -> anyhow::Result<()> {
    tripline::cli::run()
}
