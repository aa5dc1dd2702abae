fn main() -> anyhow::Result<()> {
    hosttrack::cli::run()
}
