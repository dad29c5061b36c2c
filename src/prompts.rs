//! Prompt templates for the three model calls.
//!
//! Templates are plain data; the `render_*` functions substitute the
//! placeholders and never interpret model output.

use crate::model::{CandidateSet, CleanedActivity, InputRecord};
use crate::retrieval::RetrievedEntry;

pub const CLEAN_TEXT_PROMPT: &str = r#"I want to do an LCA of business activities based on Environmentally Extended Input Output (EEIO)
Environmental Impact Factors (EIF). I am interested in the environmental impact associated with the materials
and manufacturing phase of the activity. I am given business activity descriptions, and I want to
paraphrase it to a plain language description before I select an EIF.

Below is an example, inside <example></example> XML tags, of a given activity, and its plain language description. Note that the descriptions
are brief, and do not make any assumptions about the activity.

<example>
COMMODITY                                                      20142770002
COMMODITY_DESCRIPTION      GLOVES WORK MECHANIC SYNTHETIC LEATHER SZ LARGE
EXTENDED_DESCRIPTION     RC LN_____ QTY DEL_____ P/F_____ B/O______ DEL...
CONTRACT_NAME                            MSC items for Glen Bell warehouse

The item is a synthetic leather large work gloves
</example>

Following the example, provide a plain language description of the activity data given below:
COMMODITY              {commodity}
COMMODITY_DESCRIPTION  {commodity_description}
EXTENDED_DESCRIPTION   {extended_description}
CONTRACT_NAME          {contract_name}

Make the most of the given information. DO NOT say that information is limited.
DO NOT refrain from providing a description, or ask for more information.
If you cannot provide a plain language description, simply summarize the
information provided. You MUST provide a description.

Avoid filler words such as "Based on the details" or "happy to assist",
keep your response to the point.
Do not repeat the given instructions or information.
DO NOT say you have insufficient information for an LCA.

Only provide the description and nothing else."#;

pub const POSSIBLE_MATCHES_PROMPT: &str = r#"You are a Lifecycle Analysis expert matching business activities to their North American Industry Classification System (NAICS) titles.

I want to do an LCA of business activities based on Environmentally Extended Input Output (EEIO) Environmental Impact Factors (EIF). I am interested in the environmental impact associated with the materials and manufacturing phase of the activity. I am given a business activity and I want to match it to its North American Industry Classification System code and title.

Format the output in JSON with the keys "NAICSCode1", "NAICSTitle1", "NAICSCode2", "NAICSTitle2", "NAICSCode3", "NAICSTitle3".

Below is an example, inside <example></example> XML tags, of a given activity and three possible NAICS codes and titles.

<example>
The item is a synthetic leather large work gloves.

{
	"NAICSCode1": "315990",
	"NAICSTitle1": "Apparel Accessories and Other Apparel Manufacturing",
	"NAICSCode2": "339920",
	"NAICSTitle2": "Sporting and Athletic Goods Manufacturing",
	"NAICSCode3": "316998",
	"NAICSTitle3": "All Other Leather Good and Allied Product Manufacturing"
}
</example>

What are three possible NAICS titles for the given activity:
$query$

$search_results$

Make the most of the given information. DO NOT say that information is limited or ask for more information.
YOU MUST provide three NAICS titles.
Avoid filler words such as "Based on the details" or "happy to assist", keep your response to the point.
Do not repeat the given instructions or information.
DO NOT say you have insufficient information for an LCA.

Respond with the JSON output and nothing else.
"#;

const BEST_MATCH_PREAMBLE: &str = r#"You are a Lifecycle Analysis expert matching business activities to their North American Industry Classification System (NAICS) titles.

I want to do an LCA of business activities based on Environmentally Extended Input Output (EEIO) Environmental Impact Factors (EIF). I am interested in the environmental impact associated with the materials and manufacturing phase of the activity. I am given a business activity and three possible corresponding NAICS codes and titles.

I want to pick the NAICS code and title that best match the given activity. Include justification for your choice.
Format the output in JSON with the keys "BestNAICSCode", "BestNAICSTitle", "Justification".
"#;

const BEST_MATCH_EXAMPLE: &str = r#"
<example>
Activity:
The item is a synthetic leather large work gloves.

Possible NAICS codes and titles:
315990 - Apparel Accessories and Other Apparel Manufacturing
339920 - Sporting and Athletic Goods Manufacturing
316998 - All Other Leather Good and Allied Product Manufacturing

{
    "BestNAICSCode": "315990",
    "BestNAICSTitle": "Apparel Accessories and Other Apparel Manufacturing",
    "Justification": "The most appropriate NAICS title is Apparel Accessories and Other Apparel Manufacturing. This covers work gloves made of leather or other materials, which matches the description of synthetic leather work gloves."
}
</example>
"#;

/// The preference rule for market-based over production-based factors.
pub const MARKET_OVER_PRODUCTION_RULE: &str = "Note that impact factor names with 'market' in them are better match than those with 'production' in them.";

const BEST_MATCH_BODY: &str = r#"
Activity:
{activity}

Possible NAICS codes and titles:
{candidates}

Which of these impact factors is the best match for the provided activity?

{rule}
Make the most of the given information. DO NOT say that information is limited or ask for more information.
YOU MUST choose a best code and title. YOU MUST include a justification for your choice.
Avoid filler words such as "Based on the details" or "happy to assist", keep your response to the point.
Do not repeat the given instructions or information.
DO NOT say you have insufficient information for an LCA.

Respond with the JSON output and nothing else.
"#;

/// Which Step 3 template to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPrompt {
    #[default]
    Plain,
    WithExample,
}

/// Substitutes each placeholder in a single scan of `template`, so values
/// are copied verbatim even when they contain placeholder text themselves.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while !rest.is_empty() {
        let next = values
            .iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, *placeholder, *value))
            })
            .min_by_key(|(at, _, _)| *at);

        match next {
            Some((at, placeholder, value)) => {
                out.push_str(&rest[..at]);
                out.push_str(value);
                rest = &rest[at + placeholder.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

pub fn render_clean_prompt(input: &InputRecord) -> String {
    fill_template(
        CLEAN_TEXT_PROMPT,
        &[
            ("{commodity}", input.commodity.as_str()),
            ("{commodity_description}", input.commodity_description.as_str()),
            ("{extended_description}", input.extended_description.as_str()),
            ("{contract_name}", input.contract_name.as_str()),
        ],
    )
}

/// One entry per line as `code - title`, followed by the passage when it
/// adds anything beyond the title.
pub fn render_search_results(entries: &[RetrievedEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            if e.text.trim().is_empty() || e.text.trim() == e.title.trim() {
                format!("{} - {}", e.code, e.title)
            } else {
                format!("{} - {}\n{}", e.code, e.title, e.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_possible_matches_prompt(query: &str, entries: &[RetrievedEntry]) -> String {
    fill_template(
        POSSIBLE_MATCHES_PROMPT,
        &[
            ("$query$", query),
            ("$search_results$", render_search_results(entries).as_str()),
        ],
    )
}

pub fn render_best_match_prompt(
    activity: &CleanedActivity,
    candidates: &CandidateSet,
    variant: SelectionPrompt,
) -> String {
    let lines = candidates
        .candidates()
        .iter()
        .map(|c| format!("{} - {}", c.code, c.title))
        .collect::<Vec<_>>()
        .join("\n");

    let body = fill_template(
        BEST_MATCH_BODY,
        &[
            ("{activity}", activity.simplified_description.as_str()),
            ("{candidates}", lines.as_str()),
            ("{rule}", MARKET_OVER_PRODUCTION_RULE),
        ],
    );

    match variant {
        SelectionPrompt::Plain => format!("{}{}", BEST_MATCH_PREAMBLE, body),
        SelectionPrompt::WithExample => {
            format!("{}{}{}", BEST_MATCH_PREAMBLE, BEST_MATCH_EXAMPLE, body)
        }
    }
}
