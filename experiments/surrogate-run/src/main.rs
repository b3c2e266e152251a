use {
    std::io::BufRead,
    surrogate::{Surrogate, SurrogateConfig, SurrogateError},
};

fn parse_values<'a>(fields: impl Iterator<Item = &'a str>) -> Result<Vec<f32>, SurrogateError> {
    fields
        .map(|field| {
            field
                .parse::<f32>()
                .map_err(|e| SurrogateError::Config(format!("Invalid value {:?}: {}", field, e)))
        })
        .collect()
}

fn print_row(values: &[f32]) {
    let row: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    println!("{}", row.join(" "));
}

fn main() -> Result<(), SurrogateError> {
    base::init_stdout_logger();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [x1 x2 ...]", args[0]);
        eprintln!("Without values, one input vector is read per line from stdin.");
        std::process::exit(1);
    }

    let config = SurrogateConfig::from_file(&args[1])?;
    let mut surrogate = Surrogate::create(&config)?;

    if args.len() > 2 {
        let input = parse_values(args[2..].iter().map(String::as_str))?;
        print_row(surrogate.evaluate_slice(&input)?);
        return Ok(());
    }

    let mut rows = 0;
    for line in std::io::stdin().lock().lines() {
        let line = line.map_err(|e| SurrogateError::Config(e.to_string()))?;
        let fields = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|field| !field.is_empty());
        let input = parse_values(fields)?;
        if input.is_empty() {
            continue;
        }
        print_row(surrogate.evaluate_slice(&input)?);
        rows += 1;
    }
    log::info!("Evaluated {} rows with {}", rows, surrogate.model_name());
    Ok(())
}
