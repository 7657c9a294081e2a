// example/src/main.rs

use brine_wire::*;

const SCHEMA: &str = include_str!("../market.wire");

fn main() -> Result<(), Error> {
    let (_, plan) = compile_schema(SCHEMA)?;
    let mut bytes = [0u8; 64];

    // Members go in declaration order. `venue` and `side` are skipped and
    // take their defaults; `symbolLength` is filled in from `symbol`.
    let limit = {
        let mut trade = Builder::new(&plan, "market::Trade")?;
        trade.wrap(&mut bytes, 0, 64)?;
        trade
            .set("sequence", 1001u32)?
            .set("price", 125_000)?
            .set("symbol", "BTC-USD")?
            .set("quantity", -3)?;
        let trade = trade.build()?;
        println!("built {} bytes: {}", trade.limit(), trade);
        trade.limit()
    };

    // Read it back without copying.
    let mut trade = Flyweight::new(&plan, "market::Trade")?;
    trade.wrap(&bytes, 0, limit)?;
    println!("sequence = {}", trade.get_uint("sequence")?);
    println!("venue    = {}", trade.get_uint("venue")?);
    println!("side     = {}", trade.get("side")?);
    println!("price    = {}", trade.get("price")?);
    println!("symbol   = {:?}", trade.get_bytes("symbol")?.map(String::from_utf8_lossy));
    println!("note     = {:?}", trade.get_str("note")?);
    println!("quantity = {}", trade.get_int("quantity")?);

    // The same message through the dynamic API, as JSON.
    let value = decode(&plan, "market::Trade", &bytes, 0, limit)?;
    println!("{}", serde_json::to_string_pretty(&to_json(&value))?);

    // A quote with only its required member: `ask` and `last` are absent.
    let mut quote_bytes = [0u8; 32];
    let quote = Input::fields([("bid", Input::Int(99_500))]);
    let quote_limit = encode(&plan, "market::Quote", &quote, &mut quote_bytes, 0, 32)?;
    let mut quote = Flyweight::new(&plan, "market::Quote")?;
    quote.wrap(&quote_bytes, 0, quote_limit)?;
    println!("quote    = {} (ask present: {})", quote, quote.is_present("ask")?);

    Ok(())
}
