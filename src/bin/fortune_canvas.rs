use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    fortunes::apps::run_canvas(std::env::args().skip(1))
}
