use crate::agents::update::context::UpdateCandidate;
use crate::error::Result;
use colored::Colorize;
use std::io::{self, BufRead, Write};

enum Answer {
    Yes,
    No,
    All,
    Quit,
}

/// Asks the operator which candidates to update.
///
/// Reads from any `BufRead` so the prompt loop can be driven from tests.
pub struct UpdateInteraction<R> {
    input: R,
    apply_all: bool,
}

impl<R: BufRead> UpdateInteraction<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            apply_all: false,
        }
    }

    /// Returns the chosen candidates in their original order.
    ///
    /// `q` stops asking; candidates accepted before it are still returned.
    pub fn select(&mut self, candidates: &[UpdateCandidate]) -> Result<Vec<UpdateCandidate>> {
        let mut selected = Vec::new();

        for candidate in candidates {
            println!(
                "\n{} {} {}",
                "[Update]".cyan().bold(),
                candidate.name().white().bold(),
                candidate.container.image_reference.dimmed()
            );

            if self.apply_all {
                println!("{}", "Auto-selecting (previously chose 'all').".dimmed());
                selected.push(candidate.clone());
                continue;
            }

            match self.ask()? {
                Answer::Yes => selected.push(candidate.clone()),
                Answer::No => println!("{}", "Skipping this container.".dimmed()),
                Answer::All => {
                    println!("{}", "Selecting this and all remaining containers.".green().bold());
                    self.apply_all = true;
                    selected.push(candidate.clone());
                }
                Answer::Quit => {
                    println!("{}", "Stopping selection at user request.".yellow());
                    break;
                }
            }
        }

        Ok(selected)
    }

    fn ask(&mut self) -> Result<Answer> {
        loop {
            print!("{}", "Update this container? [Y/n/a/q]: ".bold());
            io::stdout().flush()?;

            let mut line = String::new();
            // EOF behaves like quit so a closed stdin never updates silently.
            if self.input.read_line(&mut line)? == 0 {
                println!();
                return Ok(Answer::Quit);
            }

            match line.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(Answer::Yes),
                "n" | "no" => return Ok(Answer::No),
                "a" | "all" => return Ok(Answer::All),
                "q" | "quit" => return Ok(Answer::Quit),
                _ => println!("{}", "Please answer with y(es), n(o), a(ll), or q(uit).".red()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestPair;
    use crate::runtime::fake::container;
    use std::io::Cursor;

    fn candidates(names: &[&str]) -> Vec<UpdateCandidate> {
        names
            .iter()
            .map(|n| UpdateCandidate {
                container: container(n, "acme/app", 10),
                digest_pair: DigestPair::new("[a]", "b"),
            })
            .collect()
    }

    fn names(selected: &[UpdateCandidate]) -> Vec<&str> {
        selected.iter().map(UpdateCandidate::name).collect()
    }

    #[test]
    fn yes_no_and_default() {
        let mut ui = UpdateInteraction::new(Cursor::new("y\nn\n\n"));
        let selected = ui.select(&candidates(&["a", "b", "c"])).unwrap();
        assert_eq!(names(&selected), vec!["a", "c"]);
    }

    #[test]
    fn all_selects_the_rest_without_asking() {
        let mut ui = UpdateInteraction::new(Cursor::new("n\na\n"));
        let selected = ui.select(&candidates(&["a", "b", "c", "d"])).unwrap();
        assert_eq!(names(&selected), vec!["b", "c", "d"]);
    }

    #[test]
    fn quit_keeps_earlier_choices() {
        let mut ui = UpdateInteraction::new(Cursor::new("y\nq\n"));
        let selected = ui.select(&candidates(&["a", "b", "c"])).unwrap();
        assert_eq!(names(&selected), vec!["a"]);
    }

    #[test]
    fn invalid_answer_is_asked_again() {
        let mut ui = UpdateInteraction::new(Cursor::new("maybe\nY\n"));
        let selected = ui.select(&candidates(&["a"])).unwrap();
        assert_eq!(names(&selected), vec!["a"]);
    }

    #[test]
    fn eof_stops_selection() {
        let mut ui = UpdateInteraction::new(Cursor::new(""));
        assert!(ui.select(&candidates(&["a"])).unwrap().is_empty());
    }
}
