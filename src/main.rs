use json_typegraph::cli::CommandLineInterface;

fn main() -> anyhow::Result<()> {
    CommandLineInterface::load().run()
}
