use miette::*;

use joltage_machines::part2;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let input = include_str!("../../input.txt");
    let result = part2::process(input)?;
    println!("Result: {}", result);
    Ok(())
}
