use std::collections::BTreeMap;
use std::error::Error;

use clap::Args;
use texpr_algebra::{AlgebraEngine, Number, ReferenceEngine, Scope};
use texpr_verify::{Policy, EXIT_OK};

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Expression in the reference engine's surface syntax.
    pub expr: String,
    /// Variable binding `name=value`; may be repeated. Integers bind exactly.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
    pub vars: Vec<(String, Number)>,
    /// Print the simplified expression instead of its value.
    #[arg(long)]
    pub symbolic: bool,
}

fn parse_binding(raw: &str) -> Result<(String, Number), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let value = value.trim();
    let value = match value.parse::<i128>() {
        Ok(int) => Number::int(int),
        Err(_) => value
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|err| format!("invalid value for '{name}': {err}"))?,
    };
    Ok((name.trim().to_string(), value))
}

pub fn run(args: &EvalArgs) -> Result<u8, Box<dyn Error>> {
    let policy = Policy::default();
    let engine = ReferenceEngine::new(policy.engine_config());
    let bindings: BTreeMap<String, Number> = args.vars.iter().cloned().collect();
    let mut scope = Scope::new(policy.default_symbols.iter().cloned());
    for name in bindings.keys() {
        scope.declare(name.clone());
    }

    let parsed = engine.parse(&args.expr, &scope)?;
    let bound = engine.substitute(&parsed, &bindings);
    let forced = engine.force(&bound)?;
    if args.symbolic {
        println!("{}", engine.render(&engine.simplify(&forced)?));
    } else {
        println!("{:?}", engine.evaluate(&forced)?);
    }
    Ok(EXIT_OK)
}
