//! # Test Utilities
//!
//! Helpers for running "ui tests": forth source paired with the output it
//! is expected to produce.
//!
//! ## UI Tests
//!
//! Each line of a ui test is one of:
//!
//! * Configuration values for the VM, specified as "frontmatter comments".
//!   These must appear before any other non-comment lines. Currently accepted:
//!     * `( heap_size USIZE )`
//!     * `( stack_cells USIZE )`
//!     * `( input_buf_elems USIZE )`
//!     * `( output_buf_elems USIZE )`
//! * Comment lines. These are any lines just containing a `( ... )` style forth comment.
//! * Successful input lines, starting with `> ...`.
//! * Successful output lines, starting with `< ...`.
//!     * Any successful input line can have zero or more output lines
//!     * If *no* output lines are specified, ANY successful output is accepted/ignored.
//! * Unsuccessful input lines, starting with `x ...`.
//!     * The line must make [`Vm::interpret`] return an `Err`. The VM is
//!       then [reset](Vm::reset) before the next line.
//!
//! ### Example
//!
//! `testutil` is only built with the `use-std` feature, so this example is
//! not compiled as a doctest.
//!
//! ```rust,ignore
//! # use cellforth::testutil::blocking_runtest;
//! #
//! # blocking_runtest(r#"
//! ( specify VM settings with frontmatter )
//! ( stack_cells 64 )
//!
//! ( specify input with no output )
//! > : star 42 emit ;
//!
//! ( specify input and output )
//! > star star
//! < **
//!
//! ( specify lines that cause errors )
//! x drop
//! # "#)
//! ```

use crate::{Error, Resume, SuspendReason, Suspended, Vm, VmParams, BOOT};

/// Run the given ui test against a VM that has evaluated [`BOOT`].
///
/// Accepts any/all/none of the configuration frontmatter listed above.
pub fn blocking_runtest(contents: &str) {
    let tokd = tokenize(contents, true).unwrap();
    let (mut vm, resume) = booted(tokd.settings, BOOT);
    blocking_steps_with(tokd.steps.as_slice(), &mut vm, resume);
}

/// Run the given ui test against a VM with only the primitives installed.
pub fn bare_runtest(contents: &str) {
    let tokd = tokenize(contents, true).unwrap();
    let (mut vm, resume) = booted(tokd.settings, "");
    blocking_steps_with(tokd.steps.as_slice(), &mut vm, resume);
}

/// Run the given ui test against the given VM, returning the handle to
/// continue it with.
///
/// Does not accept ui tests with frontmatter configuration (will panic)
pub fn blocking_runtest_with<T>(vm: &mut Vm<T>, resume: Resume, contents: &str) -> Resume {
    let tokd = tokenize(contents, false).unwrap();
    blocking_steps_with(tokd.steps.as_slice(), vm, resume)
}

fn booted(settings: VmParams, source: &str) -> (Vm<()>, Resume) {
    let mut vm = Vm::new(settings, (), Vm::<()>::PLATFORM).unwrap();
    let resume = vm.boot(&[], source).unwrap();
    let sus = vm.run(resume).unwrap();
    assert_eq!(sus.reason, SuspendReason::InputExhausted);
    vm.output.clear();
    (vm, sus.resume)
}

fn check_output(res: &Result<Suspended, Error>, outcome: &Outcome, output: &str) {
    println!("< {output}");
    match (res, outcome) {
        (Ok(_), Outcome::OkAnyOutput) => {}
        (Ok(_), Outcome::OkWithOutput(exp)) => {
            let act_lines = output.lines().collect::<Vec<&str>>();
            assert_eq!(act_lines.len(), exp.len(), "output: {output:?}");
            act_lines.iter().zip(exp.iter()).for_each(|(a, e)| {
                assert_eq!(a.trim_end(), e.trim_end());
            })
        }
        (Err(_e), Outcome::FatalError) => {}
        (res, exp) => {
            eprintln!("Error!");
            eprintln!("Expected: {exp:?}");
            eprintln!("Got: {res:?}");
            if res.is_ok() {
                eprintln!("Output:\n{}", output);
            }
            panic!();
        }
    }
}

// Runs the given steps against the given VM.
//
// Panics on any mismatch
fn blocking_steps_with<T>(steps: &[Step], vm: &mut Vm<T>, resume: Resume) -> Resume {
    let mut resume = resume;
    for Step {
        input,
        output: outcome,
    } in steps
    {
        println!("> {input}");
        let res = vm.interpret(resume, input);
        check_output(&res, outcome, &vm.output.as_str());
        vm.output.clear();
        resume = match res {
            Ok(sus) => sus.resume,
            Err(_) => vm.reset().unwrap(),
        };
    }
    resume
}

#[derive(Debug)]
enum Outcome {
    OkAnyOutput,
    OkWithOutput(Vec<String>),
    FatalError,
}

#[derive(Debug)]
struct Step {
    input: String,
    output: Outcome,
}

#[derive(Default, Debug)]
struct Tokenized {
    settings: VmParams,
    steps: Vec<Step>,
}

fn tokenize(contents: &str, allow_frontmatter: bool) -> Result<Tokenized, ()> {
    let mut output = Tokenized::default();
    let mut frontmatter_done = !allow_frontmatter;

    for line in contents.lines() {
        let (tok, remain) = if let Some(t) = line.trim_start().split_once(' ') {
            t
        } else {
            continue;
        };

        match tok {
            ">" => {
                frontmatter_done = true;
                output.steps.push(Step {
                    input: remain.to_string(),
                    output: Outcome::OkAnyOutput,
                });
            }
            "<" => {
                frontmatter_done = true;
                let cur_step = output.steps.last_mut().ok_or(())?;
                let expected_out = remain.to_string();
                match &mut cur_step.output {
                    Outcome::OkAnyOutput => {
                        cur_step.output = Outcome::OkWithOutput(vec![expected_out]);
                    }
                    Outcome::OkWithOutput(o) => o.push(expected_out),
                    Outcome::FatalError => panic!("Fatal error can't set output"),
                }
            }
            "x" => {
                frontmatter_done = true;
                output.steps.push(Step {
                    input: remain.to_string(),
                    output: Outcome::FatalError,
                });
            }
            "(" => {
                let mut split = remain.split_whitespace();
                let key = split.next();
                let setting = match key {
                    Some("heap_size") => &mut output.settings.heap_size,
                    Some("stack_cells") => &mut output.settings.stack_cells,
                    Some("input_buf_elems") => &mut output.settings.input_buf_elems,
                    Some("output_buf_elems") => &mut output.settings.output_buf_elems,
                    Some(_) => continue,
                    None => panic!(),
                };
                *setting = split.next().unwrap().parse::<usize>().unwrap();
                assert!(!frontmatter_done, "Unexpected frontmatter settings!");
                assert_eq!(Some(")"), split.next());
            }
            _ => {}
        }
    }

    Ok(output)
}
