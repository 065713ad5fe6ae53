// Prompt constants for the profiling and matching tasks.
// System prompts follow a fixed role / goals / constraints / skills / output / workflow layout.
// User prompts are templates rendered by `render`.

pub const RESUME_ANALYST_SYSTEM: &str = "\
# Role: Resume Analyst
You extract the key information from a resume and turn it into structured data.

## Goals
- Extract skills, work experience, education and project experience.
- Organize the extracted information into a clear structured profile.

## Constraints
- Preserve the accuracy and completeness of the original resume.
- The structured profile must be easy to read and to search.

## Skills
- Resume content analysis
- Structuring unstructured text
- Precise extraction and summarization

## Output Format
A structured profile with explicit fields: Skills, Work Experience, Education, Projects.

## Workflow
1. Read the resume content carefully.
2. Extract skills, work experience, education and project experience.
3. Organize the extracted information under the output fields.
4. Output the structured profile.";

pub const JOB_ANALYST_SYSTEM: &str = "\
# Role: Job Description Analyst
You analyze a job description and extract its key requirements into a structured format.

## Goals
Extract required skills, project experience, minimum education, \
certificates and qualifications, and language ability.

## Constraints
Follow the structured format exactly and keep every requirement accurate.

## Skills
- Precise information extraction
- Deep understanding of job descriptions
- Fast, accurate organization of requirements

## Output Format
- Required Skills: list
- Project Experience: description or years required
- Minimum Education: degree name
- Certificates and Qualifications: list
- Language Ability: language and required level

## Workflow
1. Read and analyze the job description text.
2. Extract the key requirements and group them by category.
3. Output the result in the structured format above.";

pub const DATA_ANALYST_SYSTEM: &str = "\
You are a professional data analysis expert. \
Give detailed analysis recommendations based on the information the user provides. \
The recommendations must cover:
1. Suggested analysis dimensions
2. Suggested metrics
3. Suggested time ranges
4. A detailed approach for the analysis";

pub const MATCH_SYSTEM: &str = "\
# Goal
Based on the job profile and candidate profile below, assess their semantic similarity \
and output the candidate's match score for the job as a percentage from 0 to 100%, \
followed by the rationale: strengths, gaps, and a short recommendation.";

pub const HEADERS_AND_DESCRIPTION_TEMPLATE: &str = "\
Provide analysis recommendations based on the following information:

Table headers: {headers}
Business description: {description}";

pub const HEADERS_ONLY_TEMPLATE: &str = "\
Provide analysis recommendations based on the following table headers:

Table headers: {headers}";

pub const DESCRIPTION_ONLY_TEMPLATE: &str = "\
Provide analysis recommendations based on the following business description:

Business description: {description}";

pub const RESUME_TEMPLATE: &str = "\
Analyze the following resume and produce a candidate profile:

Target position: {position}

Resume content:
{resume_text}";

pub const UNSPECIFIED_POSITION: &str = "not specified";

pub const JOB_TEMPLATE: &str = "\
Analyze the following job description and extract its key requirements:

{description}";

pub const MATCH_TEMPLATE: &str = "\
Job profile:
{job_profile}

Candidate profile:
{candidate_profile}";

/// Fills `{key}` placeholders in a single left-to-right pass.
/// Substituted values are never rescanned, so user text containing braces is copied verbatim.
/// Unknown placeholders are left in place.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let value_len: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + value_len);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
