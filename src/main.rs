fn main() -> anyhow::Result<()> {
    filter_tree::run()
}
