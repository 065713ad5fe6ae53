// Prompt constants for reading table headers out of images.

pub const HEADER_RECOGNITION_SYSTEM: &str = "\
You are a precise table reader. \
You look at a screenshot or photo of a table and report its column headers. \
You never describe the image and never add commentary.";

pub const HEADER_RECOGNITION_PROMPT: &str = "\
List the column header labels of the table in this image, left to right, \
as a single line separated by commas. \
Copy each label exactly as written. \
If the image contains no table, reply with NONE.";
