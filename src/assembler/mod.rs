//! Assembler for SUBLANQ assembly (`.sla`)
//!
//! A source file declares variables, then a `__start__` line, then
//! instructions:
//!
//! ```text
//! msg 72 73 0        // array: pointer cell followed by the elements
//! i 0                // scalar
//! __start__
//! loop: drd msg i
//!     jle i :end
//!     out i 0
//!     inc msg
//!     jmp :loop
//! end: hlt
//! ```
//!
//! Every mnemonic expands to a fixed run of SUBLANQ triples. The image is laid
//! out as code, then variables in declaration order, then five scratch cells.

use crate::error::{Result, SublanqError};
use std::collections::{BTreeMap, HashMap};

/// Line separating variable declarations from code
pub const START_MARKER: &str = "__start__";

/// Scratch cells appended after the variables, in layout order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scratch {
    T1,
    T2,
    M,
    Z,
    O,
}

impl Scratch {
    const NAMES: [&'static str; 5] = ["T1", "T2", "M", "Z", "O"];
    /// Initial values of T1, T2, M (minus one), Z (zero) and O (one)
    const TRAILER: [i64; 5] = [0, 0, -1, 0, 1];

    fn offset(self) -> usize {
        self as usize
    }
}

/// A cell of the image before addresses are known
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Lit(i64),
    Var(String),
    Label { name: String, line: usize },
    Scratch(Scratch),
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Scalar(i64),
    Array(Vec<i64>),
}

/// Variables in declaration order
#[derive(Debug, Default)]
struct Variables {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Variables {
    fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Add a variable; false if the name is taken
    fn declare(&mut self, name: &str, value: Value) -> bool {
        if self.contains(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.entries.len());
        self.entries.push((name.to_string(), value));
        true
    }
}

/// Result of assembling a source file
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    /// Memory image, ready for the VM
    pub image: Vec<i64>,
    /// Code address of each label
    pub labels: BTreeMap<String, i64>,
    /// Address of each variable (the pointer cell for arrays)
    pub variables: BTreeMap<String, i64>,
}

impl Assembled {
    /// Program file text: the image as space-separated integers
    pub fn to_sq(&self) -> String {
        self.image
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn error(line: usize, message: impl Into<String>) -> SublanqError {
    SublanqError::Assembly {
        line,
        message: message.into(),
    }
}

fn is_integer(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Number of operands each mnemonic takes
fn arity(op: &str) -> Option<usize> {
    match op {
        "hlt" => Some(0),
        "zer" | "inc" | "dec" | "neg" | "jmp" => Some(1),
        "add" | "sub" | "mul" | "div" | "mod" | "mov" | "drd" | "dwt" | "jez" | "jlz" | "jle"
        | "inp" | "out" => Some(2),
        _ => None,
    }
}

/// Assembler state while walking the code section
struct Assembler {
    variables: Variables,
    labels: HashMap<String, i64>,
    code: Vec<Cell>,
}

impl Assembler {
    /// A declared variable operand
    fn variable(&self, token: &str, line: usize, text: &str) -> Result<Cell> {
        if self.variables.contains(token) {
            Ok(Cell::Var(token.to_string()))
        } else {
            Err(error(line, format!("Unknown variable: {}", text)))
        }
    }

    /// A variable or integer immediate; immediates become constant cells
    fn source(&mut self, token: &str, line: usize, text: &str) -> Result<Cell> {
        if is_integer(token) {
            let value = token
                .parse()
                .map_err(|_| error(line, format!("Invalid immediate: {}", text)))?;
            let name = format!("C{}", token);
            self.variables.declare(&name, Value::Scalar(value));
            return Ok(Cell::Var(name));
        }
        if self.variables.contains(token) {
            Ok(Cell::Var(token.to_string()))
        } else {
            Err(error(line, format!("Invalid variable or immediate: {}", text)))
        }
    }

    fn label(&self, token: &str, line: usize, text: &str) -> Result<Cell> {
        match token.strip_prefix(':') {
            Some(name) if !name.is_empty() => Ok(Cell::Label {
                name: name.to_string(),
                line,
            }),
            _ => Err(error(line, format!("Label must start with ':': {}", text))),
        }
    }

    fn port(&self, token: &str, line: usize, text: &str) -> Result<Cell> {
        let invalid = || error(line, format!("Invalid port (must be a non-negative immediate): {}", text));
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        token.parse().map(Cell::Lit).map_err(|_| invalid())
    }

    /// Expand one instruction at the current code address
    fn instruction(&mut self, op: &str, args: &[&str], line: usize, text: &str) -> Result<()> {
        use Scratch::*;

        let expected = arity(op).ok_or_else(|| error(line, format!("Invalid operation: {}", text)))?;
        if args.len() != expected {
            return Err(error(line, format!("Incorrect number of arguments given: {}", text)));
        }

        let n = self.code.len() as i64;
        let r = |k: i64| Cell::Lit(n + k);
        let s = Cell::Scratch;
        let (t1, t2, m, z, o) = (s(T1), s(T2), s(M), s(Z), s(O));

        let cells = match op {
            "zer" => {
                let x = self.variable(args[0], line, text)?;
                vec![x.clone(), x, r(3)]
            }
            "inc" => {
                let x = self.variable(args[0], line, text)?;
                vec![x, m, r(3)]
            }
            "dec" => {
                let x = self.variable(args[0], line, text)?;
                vec![x, o, r(3)]
            }
            "neg" => {
                let x = self.variable(args[0], line, text)?;
                vec![
                    t1.clone(), x.clone(), r(3),
                    x.clone(), x.clone(), r(6),
                    z.clone(), t1.clone(), r(9),
                    x, z.clone(), r(12),
                    z.clone(), z, r(15),
                    t1.clone(), t1, r(18),
                ]
            }
            "jmp" => {
                let target = self.label(args[0], line, text)?;
                vec![z.clone(), z, target]
            }
            "add" | "sub" | "mul" | "div" | "mod" | "mov" | "dwt" => {
                let y = self.variable(args[1], line, text)?;
                let x = self.source(args[0], line, text)?;
                match op {
                    // y += x
                    "add" => vec![
                        z.clone(), x, r(3),
                        y, z.clone(), r(6),
                        z.clone(), z, r(9),
                    ],
                    // y -= x
                    "sub" => vec![y, x, r(3)],
                    // y *= x
                    "mul" => vec![
                        z.clone(), x, r(3),
                        t1.clone(), z.clone(), r(6),
                        z.clone(), z.clone(), r(9),
                        t2.clone(), y.clone(), r(12),
                        t1.clone(), o, r(15),
                        t1.clone(), z.clone(), r(24),
                        y, t2.clone(), r(21),
                        z.clone(), z, r(12),
                        t1.clone(), t1, r(27),
                        t2.clone(), t2, r(30),
                    ],
                    // y /= x
                    "div" => vec![
                        z.clone(), y.clone(), r(3),
                        t2.clone(), z.clone(), r(6),
                        z.clone(), z.clone(), r(9),
                        y.clone(), y.clone(), r(12),
                        t2.clone(), x, r(15),
                        t1.clone(), t2.clone(), r(18),
                        t1.clone(), z.clone(), r(27),
                        t1.clone(), t1.clone(), r(24),
                        z.clone(), z.clone(), r(36),
                        t1.clone(), t1, r(30),
                        y, m, r(33),
                        z.clone(), z, r(12),
                        t2.clone(), t2, r(39),
                    ],
                    // y %= x
                    "mod" => vec![
                        y.clone(), x.clone(), r(3),
                        t1.clone(), y.clone(), r(6),
                        t1.clone(), z.clone(), r(21),
                        t1.clone(), t1.clone(), r(12),
                        z.clone(), x, r(15),
                        y, z.clone(), r(18),
                        z.clone(), z.clone(), r(27),
                        t1.clone(), t1, r(24),
                        z.clone(), z, r(0),
                    ],
                    // y = x
                    "mov" => vec![
                        y.clone(), y.clone(), r(3),
                        z.clone(), x, r(6),
                        y, z.clone(), r(9),
                        z.clone(), z, r(12),
                    ],
                    // *y = x, through self-modified cells at n+24, n+25 and n+30
                    _ => vec![
                        r(24), r(24), r(3),
                        r(25), r(25), r(6),
                        r(30), r(30), r(9),
                        z.clone(), y, r(12),
                        r(24), z.clone(), r(15),
                        r(25), z.clone(), r(18),
                        r(30), z.clone(), r(21),
                        z.clone(), z.clone(), r(24),
                        Cell::Lit(0), Cell::Lit(0), r(27),
                        z.clone(), x, r(30),
                        Cell::Lit(0), z.clone(), r(33),
                        z.clone(), z, r(36),
                    ],
                }
            }
            // y = *x, through the self-modified cell at n+16
            "drd" => {
                let x = self.variable(args[0], line, text)?;
                let y = self.variable(args[1], line, text)?;
                vec![
                    r(16), r(16), r(3),
                    z.clone(), x, r(6),
                    r(16), z.clone(), r(9),
                    z.clone(), z.clone(), r(12),
                    y.clone(), y.clone(), r(15),
                    z.clone(), Cell::Lit(0), r(18),
                    y, z.clone(), r(21),
                    z.clone(), z, r(24),
                ]
            }
            "jez" | "jlz" | "jle" => {
                let x = self.variable(args[0], line, text)?;
                let target = self.label(args[1], line, text)?;
                match op {
                    "jle" => vec![x, z, target],
                    "jlz" => vec![
                        t1.clone(), x, r(3),
                        t1.clone(), z.clone(), r(12),
                        t1.clone(), t1.clone(), r(9),
                        z.clone(), z, target,
                        t1.clone(), t1, r(15),
                    ],
                    _ => vec![
                        x.clone(), z.clone(), r(6),
                        z.clone(), z.clone(), r(24),
                        t1.clone(), x, r(9),
                        t1.clone(), z.clone(), r(15),
                        z.clone(), z.clone(), r(21),
                        t1.clone(), t1.clone(), r(18),
                        z.clone(), z, target,
                        t1.clone(), t1, r(24),
                    ],
                }
            }
            "inp" => {
                let x = self.variable(args[0], line, text)?;
                let port = self.port(args[1], line, text)?;
                vec![Cell::Lit(-1), x, port]
            }
            "out" => {
                let x = self.source(args[0], line, text)?;
                let port = self.port(args[1], line, text)?;
                vec![x, Cell::Lit(-1), port]
            }
            // hlt
            _ => vec![z.clone(), z, Cell::Lit(-1)],
        };

        self.code.extend(cells);
        Ok(())
    }

    /// Lay out variables and scratch cells after the code and resolve names
    fn link(self) -> Result<Assembled> {
        let mut image_cells = self.code;
        let mut addresses = BTreeMap::new();

        let mut n = image_cells.len() as i64;
        for (name, value) in &self.variables.entries {
            addresses.insert(name.clone(), n);
            match value {
                Value::Scalar(v) => {
                    image_cells.push(Cell::Lit(*v));
                    n += 1;
                }
                Value::Array(values) => {
                    image_cells.push(Cell::Lit(n + 1));
                    image_cells.extend(values.iter().map(|v| Cell::Lit(*v)));
                    n += values.len() as i64 + 1;
                }
            }
        }
        image_cells.extend(Scratch::TRAILER.iter().map(|v| Cell::Lit(*v)));

        let scratch_base = (image_cells.len() - Scratch::TRAILER.len()) as i64;
        let mut image = Vec::with_capacity(image_cells.len());
        for cell in image_cells {
            let value = match cell {
                Cell::Lit(v) => v,
                Cell::Scratch(s) => scratch_base + s.offset() as i64,
                Cell::Var(name) => *addresses
                    .get(&name)
                    .ok_or_else(|| error(0, format!("Unknown variable: {}", name)))?,
                Cell::Label { name, line } => *self
                    .labels
                    .get(&name)
                    .ok_or_else(|| error(line, format!("Unknown label: {}", name)))?,
            };
            image.push(value);
        }

        Ok(Assembled {
            image,
            labels: self.labels.into_iter().collect(),
            variables: addresses,
        })
    }
}

fn declare_variable(variables: &mut Variables, line: usize, text: &str) -> Result<()> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let name = tokens[0];

    if Scratch::NAMES.contains(&name) || name.starts_with('C') || name.contains(':') {
        return Err(error(line, format!("Invalid variable name: {}", text)));
    }
    if variables.contains(name) {
        return Err(error(line, format!("Reassignment of variable: {}", text)));
    }

    let values = tokens[1..]
        .iter()
        .map(|t| t.parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| error(line, format!("Invalid variable assignment: {}", text)))?;

    let value = match values.len() {
        0 => {
            return Err(error(
                line,
                format!("Variable must have at least 1 assigned value: {}", text),
            ))
        }
        1 => Value::Scalar(values[0]),
        _ => Value::Array(values),
    };
    variables.declare(name, value);
    Ok(())
}

/// Assemble a `.sla` source into a memory image
pub fn assemble(source: &str) -> Result<Assembled> {
    // (1-based line number, text without comment)
    let lines: Vec<(usize, &str)> = source
        .lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.split("//").next().unwrap_or("").trim()))
        .filter(|(_, text)| !text.is_empty())
        .collect();

    let start = lines
        .iter()
        .position(|(_, text)| *text == START_MARKER)
        .ok_or_else(|| error(source.lines().count().max(1), "Must have a __start__ symbol"))?;

    let mut assembler = Assembler {
        variables: Variables::default(),
        labels: HashMap::new(),
        code: Vec::new(),
    };

    for &(line, text) in &lines[..start] {
        declare_variable(&mut assembler.variables, line, text)?;
    }

    for &(line, text) in &lines[start + 1..] {
        let mut tokens: Vec<&str> = text.split_whitespace().collect();

        if let Some(label) = tokens[0].strip_suffix(':') {
            if assembler
                .labels
                .insert(label.to_string(), assembler.code.len() as i64)
                .is_some()
            {
                return Err(error(line, format!("Duplicate label: {}", label)));
            }
            tokens.remove(0);
            if tokens.is_empty() {
                continue;
            }
        }

        assembler.instruction(tokens[0], &tokens[1..], line, text)?;
    }

    let assembled = assembler.link()?;
    log::debug!(
        "assembled {} cells, {} labels, {} variables",
        assembled.image.len(),
        assembled.labels.len(),
        assembled.variables.len()
    );
    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halt_only() {
        let program = assemble("__start__\nhlt").unwrap();
        // hlt, then T1 T2 M Z O
        assert_eq!(program.image, vec![6, 6, -1, 0, 0, -1, 0, 1]);
        assert_eq!(program.to_sq(), "6 6 -1 0 0 -1 0 1");
    }

    #[test]
    fn test_variable_layout() {
        let program = assemble("a 5\nbuf 7 8 9\n__start__\nhlt").unwrap();
        // code 0..3, a at 3, buf pointer at 4 -> 5, elements 5..8, scratch 8..13
        assert_eq!(program.variables["a"], 3);
        assert_eq!(program.variables["buf"], 4);
        assert_eq!(&program.image[3..8], &[5, 5, 7, 8, 9]);
        assert_eq!(&program.image[8..], &[0, 0, -1, 0, 1]);
    }

    #[test]
    fn test_io_encoding() {
        let program = assemble("c 0\n__start__\ninp c 0\nout c 1\nout 65 0\nhlt").unwrap();
        let c = program.variables["c"];
        let c65 = program.variables["C65"];
        assert_eq!(&program.image[0..3], &[-1, c, 0]);
        assert_eq!(&program.image[3..6], &[c, -1, 1]);
        assert_eq!(&program.image[6..9], &[c65, -1, 0]);
        assert_eq!(program.image[c65 as usize], 65);
    }

    #[test]
    fn test_labels_resolve() {
        let program = assemble("x 1\n__start__\ntop:\n  dec x\n  jle x :done\n  jmp :top\ndone: hlt").unwrap();
        assert_eq!(program.labels["top"], 0);
        assert_eq!(program.labels["done"], 9);
        assert_eq!(program.image[5], 9);
        assert_eq!(program.image[8], 0);
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let program = assemble("// header\n\na 1 // one\n__start__\n\nhlt // stop\n").unwrap();
        assert_eq!(program.variables["a"], 3);
    }

    #[test]
    fn test_repeated_immediate_shares_cell() {
        let program = assemble("a 0\n__start__\nadd 2 a\nadd 2 a\nhlt").unwrap();
        assert_eq!(program.variables.len(), 2);
    }

    fn assembly_error(source: &str) -> (usize, String) {
        match assemble(source) {
            Err(SublanqError::Assembly { line, message }) => (line, message),
            other => panic!("expected assembly error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_start() {
        let (_, message) = assembly_error("a 1\nhlt");
        assert!(message.contains("__start__"));
    }

    #[test]
    fn test_invalid_declarations() {
        assert!(assembly_error("Z 1\n__start__\nhlt").1.contains("Invalid variable name"));
        assert!(assembly_error("Count 1\n__start__\nhlt").1.contains("Invalid variable name"));
        assert!(assembly_error("a: 1\n__start__\nhlt").1.contains("Invalid variable name"));
        assert!(assembly_error("a 1\na 2\n__start__\nhlt").1.contains("Reassignment"));
        assert!(assembly_error("a\n__start__\nhlt").1.contains("at least 1"));
        assert!(assembly_error("a x\n__start__\nhlt").1.contains("Invalid variable assignment"));
    }

    #[test]
    fn test_invalid_instructions() {
        assert_eq!(assembly_error("a 1\n__start__\n\nfoo a").0, 4);
        assert!(assembly_error("__start__\nfoo").1.contains("Invalid operation"));
        assert!(assembly_error("a 1\n__start__\ninc a a").1.contains("number of arguments"));
        assert!(assembly_error("__start__\ninc b").1.contains("Unknown variable"));
        assert!(assembly_error("a 1\n__start__\njmp end").1.contains("must start with ':'"));
        assert!(assembly_error("a 1\n__start__\nadd b a").1.contains("variable or immediate"));
        assert!(assembly_error("a 1\n__start__\nout a x").1.contains("Invalid port"));
        assert!(assembly_error("a 1\n__start__\ninp a -1").1.contains("Invalid port"));
        assert!(assembly_error("a 1\n__start__\nx: hlt\nx: hlt").1.contains("Duplicate label"));
    }

    #[test]
    fn test_unknown_label_reports_use_site() {
        let (line, message) = assembly_error("a 1\n__start__\nhlt\njmp :nowhere");
        assert_eq!(line, 4);
        assert!(message.contains("nowhere"));
    }
}
