//! Static and templated files written alongside the generated page.

use chrono::{DateTime, Utc};

pub const INDEX_PATH: &str = "index.html";
pub const LICENSE_PATH: &str = "LICENSE";
pub const README_PATH: &str = "README.md";

pub const MIT_LICENSE: &str = r#"MIT License

Copyright (c) 2024

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
"#;

/// Repository description, capped at 100 characters of brief.
pub fn repo_description(brief: &str) -> String {
    let short: String = brief.chars().take(100).collect();
    format!("Auto-generated app: {}", short)
}

/// Render the README for a generated repository.
pub fn render_readme(
    repo_name: &str,
    task_id: &str,
    brief: &str,
    generated_at: DateTime<Utc>,
) -> String {
    format!(
        r#"# {repo_name}

## Summary
This application was automatically generated to fulfill the following requirement:

{brief}

## Setup
1. Clone this repository
2. Open `index.html` in a web browser or deploy to any static hosting service

## Usage
Open the deployed GitHub Pages URL, or open `index.html` locally.

## Code Explanation
This is a single-page web application that:
- Uses modern HTML5, CSS3, and JavaScript
- Implements the required functionality as specified
- Uses CDN-hosted libraries for dependencies
- Is fully self-contained and ready for deployment

## License
MIT License - See LICENSE file for details

## Task Information
- Task ID: {task_id}
- Generated: {generated}
"#,
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}
