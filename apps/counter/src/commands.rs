//! Prompt command parsing.

use std::path::PathBuf;

use chrono::NaiveDate;
use tally_core::scan::parse_label_date;

pub const HELP: &str = "\
Commands:
  scan <path>...          read product labels from image files
  code <code>             add a product by its code
  name <text> [expiry]    add a product by name, optionally with its expiry date
  qty <line#> <n>         set the quantity of a cart line
  rm <line#>              remove a cart line
  cart                    show the cart
  checkout                print the receipt and settle stock
  cancel                  discard the cart and start over
  help                    show this help
  quit                    leave the counter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan(Vec<PathBuf>),
    Code(String),
    Name {
        text: String,
        expiry: Option<NaiveDate>,
    },
    Quantity {
        line: usize,
        quantity: i64,
    },
    Remove(usize),
    Cart,
    Checkout,
    Cancel,
    Help,
    Quit,
}

impl Command {
    /// Parses one prompt line. Blank lines are `Ok(None)`.
    pub fn parse(input: &str) -> Result<Option<Command>, String> {
        let mut words = input.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "scan" | "s" => {
                if args.is_empty() {
                    return Err("usage: scan <path>...".into());
                }
                Command::Scan(args.iter().map(PathBuf::from).collect())
            }
            "code" | "c" => match args.as_slice() {
                [code] => Command::Code(code.to_string()),
                _ => return Err("usage: code <code>".into()),
            },
            "name" | "n" => {
                let (expiry, words) = match args.split_last() {
                    Some((last, rest)) if !rest.is_empty() => match parse_label_date(last) {
                        Some(date) => (Some(date), rest),
                        None => (None, args.as_slice()),
                    },
                    _ => (None, args.as_slice()),
                };
                if words.is_empty() {
                    return Err("usage: name <text> [expiry]".into());
                }
                Command::Name {
                    text: words.join(" "),
                    expiry,
                }
            }
            "qty" | "q" => match args.as_slice() {
                [line, quantity] => Command::Quantity {
                    line: parse_line(line)?,
                    quantity: quantity
                        .parse()
                        .map_err(|_| format!("not a quantity: {}", quantity))?,
                },
                _ => return Err("usage: qty <line#> <n>".into()),
            },
            "rm" | "remove" => match args.as_slice() {
                [line] => Command::Remove(parse_line(line)?),
                _ => return Err("usage: rm <line#>".into()),
            },
            "cart" | "ls" => Command::Cart,
            "checkout" | "pay" => Command::Checkout,
            "cancel" => Command::Cancel,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

fn parse_line(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("not a line number: {}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_unknown() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn test_scan_takes_many_paths() {
        assert_eq!(
            Command::parse("scan a.jpg b.png").unwrap(),
            Some(Command::Scan(vec!["a.jpg".into(), "b.png".into()]))
        );
        assert!(Command::parse("scan").is_err());
    }

    #[test]
    fn test_name_with_optional_expiry() {
        assert_eq!(
            Command::parse("name whole milk 01/02/2024").unwrap(),
            Some(Command::Name {
                text: "whole milk".into(),
                expiry: NaiveDate::from_ymd_opt(2024, 2, 1),
            })
        );
        assert_eq!(
            Command::parse("n bread").unwrap(),
            Some(Command::Name {
                text: "bread".into(),
                expiry: None,
            })
        );
        // A lone date is the name, not an expiry
        assert_eq!(
            Command::parse("name 2024-01-01").unwrap(),
            Some(Command::Name {
                text: "2024-01-01".into(),
                expiry: None,
            })
        );
    }

    #[test]
    fn test_quantity_and_remove() {
        assert_eq!(
            Command::parse("qty 2 5").unwrap(),
            Some(Command::Quantity { line: 2, quantity: 5 })
        );
        assert_eq!(
            Command::parse("qty 1 -3").unwrap(),
            Some(Command::Quantity { line: 1, quantity: -3 })
        );
        assert!(Command::parse("qty 0 5").is_err());
        assert!(Command::parse("qty x 5").is_err());
        assert_eq!(Command::parse("rm 3").unwrap(), Some(Command::Remove(3)));
        assert!(Command::parse("rm").is_err());
    }

    #[test]
    fn test_simple_verbs() {
        assert_eq!(Command::parse("CHECKOUT").unwrap(), Some(Command::Checkout));
        assert_eq!(Command::parse("cart").unwrap(), Some(Command::Cart));
        assert_eq!(Command::parse("cancel").unwrap(), Some(Command::Cancel));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
        assert_eq!(Command::parse("code 8901234567890").unwrap(), Some(Command::Code("8901234567890".into())));
    }
}
