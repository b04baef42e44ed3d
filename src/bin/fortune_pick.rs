use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    fortunes::apps::run_pick(std::env::args().skip(1))
}
