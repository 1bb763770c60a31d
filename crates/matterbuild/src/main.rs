fn main() -> anyhow::Result<()> {
    matterbuild::run()
}
