//! Built-in exercises: reference solutions and their case generators.

use crate::console::{input, print};
use crate::errors::{ExerciseError, GraderError};
use crate::random::Lcg;
use crate::registry::Registry;
use crate::types::{Arguments, ExerciseResult, TestCases};
use serde_json::{json, Value};

pub const STRINGS_ACTIVITY: &str = "p2act6";
pub const INTRO_IO_ACTIVITY: &str = "intro_io";

const USERNAME_ALPHABET: &str = "abcdefghijklmnop1234567";
const EMAIL_DOMAINS: [&str; 4] = ["gmail.com", "outlook.com", "hotmail.com", "yahoo.com"];
const PALINDROME_ALPHABET: &str = "abcdefghiABCDEFGHI";
const DNA_BASES: &str = "ATGC";
const ANAGRAM_ALPHABET: &str = "abcdefghijABCDEFGHIJ";
const NAMES: [&str; 6] = ["Alice", "Bob", "Chen", "Dana", "Emeka", "Farah"];

pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();

    registry.register_pure(STRINGS_ACTIVITY, "username_domain", username_domain, username_domain_cases);
    registry.register_pure(
        STRINGS_ACTIVITY,
        "palindrome_checker",
        palindrome_checker,
        palindrome_checker_cases,
    );
    registry.register_pure(
        STRINGS_ACTIVITY,
        "complimentary_dna",
        complimentary_dna,
        complimentary_dna_cases,
    );
    registry.register_pure(STRINGS_ACTIVITY, "anagram_checker", anagram_checker, anagram_checker_cases);

    registry.register_interactive(INTRO_IO_ACTIVITY, "greet_user", greet_user, greet_user_cases);
    registry.register_interactive(
        INTRO_IO_ACTIVITY,
        "number_guesser",
        number_guesser,
        number_guesser_cases,
    );
    registry.register_interactive(INTRO_IO_ACTIVITY, "running_total", running_total, running_total_cases);

    registry
}

fn pick<'a>(rng: &mut Lcg, items: &[&'a str]) -> &'a str {
    rng.choice(items).copied().unwrap_or_default()
}

fn pick_len(rng: &mut Lcg, lengths: &[usize]) -> usize {
    rng.choice(lengths).copied().unwrap_or(0)
}

// ── p2act6: string functions ─────────────────────────────────────────────────

pub fn username_domain(args: &Arguments) -> ExerciseResult {
    let email = args.str("email")?;
    let (username, domain) = email.split_once('@').ok_or_else(|| ExerciseError::InvalidArgument {
        name: "email".to_string(),
        expected: "an address containing @".to_string(),
    })?;
    Ok(json!([username, domain]))
}

fn username_domain_cases(rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
    let args = (0..num_tests)
        .map(|_| {
            let len = pick_len(rng, &[5, 7, 10]);
            let username = rng.string_from(USERNAME_ALPHABET, len);
            let domain = pick(rng, &EMAIL_DOMAINS);
            Arguments::new().with("email", format!("{username}@{domain}"))
        })
        .collect();
    Ok(TestCases::without_inputs(args))
}

pub fn palindrome_checker(args: &Arguments) -> ExerciseResult {
    let word = args.str("word")?.to_lowercase();
    let reversed: String = word.chars().rev().collect();
    Ok(Value::Bool(word == reversed))
}

fn palindrome_checker_cases(rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
    let random_half = num_tests / 2;
    let mut args = Vec::with_capacity(num_tests);
    for _ in 0..random_half {
        let len = pick_len(rng, &[4, 6, 8]);
        args.push(Arguments::new().with("word", rng.string_from(PALINDROME_ALPHABET, len)));
    }
    for _ in random_half..num_tests {
        let len = pick_len(rng, &[3, 5, 7]);
        let half = rng.string_from(PALINDROME_ALPHABET, len);
        let mirrored: String = half.chars().rev().collect::<String>().to_lowercase();
        args.push(Arguments::new().with("word", format!("{half}{mirrored}")));
    }
    Ok(TestCases::without_inputs(args))
}

pub fn complimentary_dna(args: &Arguments) -> ExerciseResult {
    let strand = args.str("dna_strand")?;
    let complement = strand
        .chars()
        .map(|base| match base {
            'A' => Ok('T'),
            'T' => Ok('A'),
            'G' => Ok('C'),
            'C' => Ok('G'),
            other => Err(ExerciseError::Failed(format!("unknown base '{other}'"))),
        })
        .collect::<Result<String, _>>()?;
    Ok(Value::String(complement))
}

fn complimentary_dna_cases(rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
    let args = (0..num_tests)
        .map(|_| {
            let len = pick_len(rng, &[6, 10, 14]);
            Arguments::new().with("dna_strand", rng.string_from(DNA_BASES, len))
        })
        .collect();
    Ok(TestCases::without_inputs(args))
}

pub fn anagram_checker(args: &Arguments) -> ExerciseResult {
    let word1 = args.str("word1")?.to_lowercase();
    let word2 = args.str("word2")?.to_lowercase();
    if word1.chars().count() != word2.chars().count() {
        return Ok(Value::Bool(false));
    }
    let same_counts = word1.chars().all(|letter| {
        word1.chars().filter(|c| *c == letter).count() == word2.chars().filter(|c| *c == letter).count()
    });
    Ok(Value::Bool(same_counts))
}

fn anagram_checker_cases(rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
    let random_half = num_tests / 2;
    let mut args = Vec::with_capacity(num_tests);
    for _ in 0..random_half {
        let len1 = pick_len(rng, &[4, 6, 8]);
        let word1 = rng.string_from(ANAGRAM_ALPHABET, len1);
        let len2 = pick_len(rng, &[4, 6, 8]);
        let word2 = rng.string_from(ANAGRAM_ALPHABET, len2);
        args.push(Arguments::new().with("word1", word1).with("word2", word2));
    }
    for _ in random_half..num_tests {
        let len = pick_len(rng, &[4, 6, 8]);
        let word1 = rng.string_from(ANAGRAM_ALPHABET, len);
        let mut letters: Vec<char> = word1.chars().collect();
        rng.shuffle(&mut letters);
        let anagram: String = letters.into_iter().collect::<String>().to_lowercase();
        args.push(Arguments::new().with("word1", word1).with("word2", anagram));
    }
    Ok(TestCases::without_inputs(args))
}

// ── intro_io: interactive functions ──────────────────────────────────────────

pub fn greet_user(_: &Arguments) -> ExerciseResult {
    let name = input("What is your name? ")?;
    let age = input("How old are you? ")?;
    match age.trim().parse::<i64>() {
        Ok(age) => print(format!("Hello {name}, next year you will be {}.", age + 1)),
        Err(_) => print(format!("Sorry {name}, \"{age}\" is not a number.")),
    }
    Ok(Value::Null)
}

fn greet_user_cases(rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
    let mut inputs = Vec::with_capacity(num_tests);
    for idx in 0..num_tests {
        let name = pick(rng, &NAMES).to_string();
        let age = if idx % 5 == 4 {
            "twenty".to_string()
        } else {
            rng.next_in(5, 90).to_string()
        };
        inputs.push(vec![name, age]);
    }
    TestCases::new(inputs, vec![Arguments::new(); num_tests])
}

/// Prompts until the secret is guessed, giving a hint after each wrong guess.
pub fn number_guesser(args: &Arguments) -> ExerciseResult {
    let secret = args.int("secret")?;
    let mut tries = 0;
    loop {
        let raw = input("Guess a number: ")?;
        let Ok(guess) = raw.trim().parse::<i64>() else {
            print("Please enter a whole number.");
            continue;
        };
        tries += 1;
        if guess < secret {
            print("Too low!");
        } else if guess > secret {
            print("Too high!");
        } else {
            print(format!("You got it in {tries} tries!"));
            return Ok(json!(tries));
        }
    }
}

fn number_guesser_cases(rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
    let mut inputs = Vec::with_capacity(num_tests);
    let mut args = Vec::with_capacity(num_tests);
    for _ in 0..num_tests {
        let secret = rng.next_in(1, 20);
        let (mut low, mut high) = (1, 20);
        let mut guesses = Vec::new();
        loop {
            let guess = rng.next_in(low, high);
            guesses.push(guess.to_string());
            if guess == secret {
                break;
            }
            if guess < secret {
                low = guess + 1;
            } else {
                high = guess - 1;
            }
        }
        inputs.push(guesses);
        args.push(Arguments::new().with("secret", secret));
    }
    TestCases::new(inputs, args)
}

/// Sums numbers until a blank line, then reports the total.
pub fn running_total(_: &Arguments) -> ExerciseResult {
    let mut total = 0i64;
    loop {
        let raw = input("Enter a number (blank to stop): ")?;
        if raw.trim().is_empty() {
            break;
        }
        match raw.trim().parse::<i64>() {
            Ok(value) => total += value,
            Err(_) => print(format!("Skipping \"{raw}\".")),
        }
    }
    print(format!("Total: {total}"));
    Ok(json!(total))
}

fn running_total_cases(rng: &mut Lcg, num_tests: usize) -> Result<TestCases, GraderError> {
    let inputs = (0..num_tests)
        .map(|_| {
            let count = rng.next_in(0, 5);
            let mut values: Vec<String> = (0..count).map(|_| rng.next_in(-50, 50).to_string()).collect();
            values.push(String::new());
            values
        })
        .collect::<Vec<_>>();
    TestCases::new(inputs, vec![Arguments::new(); num_tests])
}
