use ulid::Ulid;

use crate::engine::RevenueRange;
use crate::model::{DurationCode, LotId, SlotId, VehicleClass};

/// Parsed command from console input.
#[derive(Debug, PartialEq)]
pub enum Command {
    Lots,
    Floors {
        lot: LotId,
    },
    Grid {
        lot: LotId,
        floor: String,
        filter: Option<VehicleClass>,
    },
    Book {
        lot: LotId,
        floor: String,
        slot: SlotId,
        vehicle: VehicleClass,
        duration: DurationCode,
        name: String,
        phone: String,
        vehicle_number: String,
        email: Option<String>,
    },
    Bookings,
    Pass {
        booking: Ulid,
    },
    Stats,
    Revenue {
        range: RevenueRange,
    },
    Notifications,
    MarkRead,
    Login {
        username: String,
        password: String,
    },
    Logout,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let tokens = tokenize(line)?;
    let Some((head, args)) = tokens.split_first() else {
        return Err(ParseError::Empty);
    };

    match head.as_str() {
        "lots" => expect_arity("lots", args, 0).map(|_| Command::Lots),
        "floors" => {
            expect_arity("floors", args, 1)?;
            Ok(Command::Floors {
                lot: parse_lot(&args[0])?,
            })
        }
        "grid" => {
            if args.len() < 2 || args.len() > 3 {
                return Err(ParseError::WrongArity("grid", 2, args.len()));
            }
            let filter = match args.get(2) {
                Some(v) => Some(parse_vehicle(v)?),
                None => None,
            };
            Ok(Command::Grid {
                lot: parse_lot(&args[0])?,
                floor: args[1].clone(),
                filter,
            })
        }
        "book" => {
            if args.len() < 8 || args.len() > 9 {
                return Err(ParseError::WrongArity("book", 8, args.len()));
            }
            Ok(Command::Book {
                lot: parse_lot(&args[0])?,
                floor: args[1].clone(),
                slot: SlotId::from(args[2].as_str()),
                vehicle: parse_vehicle(&args[3])?,
                duration: parse_duration(&args[4])?,
                name: args[5].clone(),
                phone: args[6].clone(),
                vehicle_number: args[7].clone(),
                email: args.get(8).cloned(),
            })
        }
        "bookings" => expect_arity("bookings", args, 0).map(|_| Command::Bookings),
        "pass" => {
            expect_arity("pass", args, 1)?;
            let booking = Ulid::from_string(&args[0])
                .map_err(|_| ParseError::BadBookingId(args[0].clone()))?;
            Ok(Command::Pass { booking })
        }
        "stats" => expect_arity("stats", args, 0).map(|_| Command::Stats),
        "revenue" => {
            expect_arity("revenue", args, 1)?;
            let range =
                RevenueRange::parse(&args[0]).ok_or(ParseError::BadRange(args[0].clone()))?;
            Ok(Command::Revenue { range })
        }
        "notifications" => expect_arity("notifications", args, 0).map(|_| Command::Notifications),
        "mark-read" => expect_arity("mark-read", args, 0).map(|_| Command::MarkRead),
        "login" => {
            expect_arity("login", args, 2)?;
            Ok(Command::Login {
                username: args[0].clone(),
                password: args[1].clone(),
            })
        }
        "logout" => expect_arity("logout", args, 0).map(|_| Command::Logout),
        "help" => expect_arity("help", args, 0).map(|_| Command::Help),
        "quit" | "exit" => expect_arity("quit", args, 0).map(|_| Command::Quit),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

/// Whitespace split with double-quoted tokens, so names with spaces work:
/// `book 1 G G1-C car 2 "Jane Doe" 555-0101 KA01AB1234`.
fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.trim().chars() {
        match c {
            '"' => {
                if in_quotes {
                    tokens.push(std::mem::take(&mut current));
                }
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(ParseError::UnterminatedQuote);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn expect_arity(cmd: &'static str, args: &[String], want: usize) -> Result<(), ParseError> {
    if args.len() != want {
        return Err(ParseError::WrongArity(cmd, want, args.len()));
    }
    Ok(())
}

fn parse_lot(token: &str) -> Result<LotId, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::BadLotId(token.to_string()))
}

fn parse_vehicle(token: &str) -> Result<VehicleClass, ParseError> {
    VehicleClass::parse(token).ok_or_else(|| ParseError::BadVehicle(token.to_string()))
}

fn parse_duration(token: &str) -> Result<DurationCode, ParseError> {
    DurationCode::parse(token).ok_or_else(|| ParseError::BadDuration(token.to_string()))
}

#[derive(Debug, PartialEq)]
pub enum ParseError {
    Empty,
    UnknownCommand(String),
    WrongArity(&'static str, usize, usize),
    UnterminatedQuote,
    BadLotId(String),
    BadVehicle(String),
    BadDuration(String),
    BadRange(String),
    BadBookingId(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty command"),
            ParseError::UnknownCommand(cmd) => {
                write!(f, "unknown command: {cmd} (try 'help')")
            }
            ParseError::WrongArity(cmd, want, got) => {
                write!(f, "{cmd}: expected {want} arguments, got {got}")
            }
            ParseError::UnterminatedQuote => write!(f, "unterminated quote"),
            ParseError::BadLotId(t) => write!(f, "not a lot id: {t}"),
            ParseError::BadVehicle(t) => {
                write!(f, "unknown vehicle type: {t} (car, bike, suv, ev)")
            }
            ParseError::BadDuration(t) => {
                write!(f, "unknown duration: {t} (1, 2, 4, 8 or 24 hours)")
            }
            ParseError::BadRange(t) => {
                write!(f, "unknown range: {t} (today, week, month, year)")
            }
            ParseError::BadBookingId(t) => write!(f, "not a booking id: {t}"),
        }
    }
}

impl std::error::Error for ParseError {}
