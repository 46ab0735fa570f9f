//! Index page markup.
//!
//! Single self-contained HTML page: upload form, contrast slider, inline
//! CAPTCHA image and a result panel filled in from the `/process` JSON.

use crate::config::{DEFAULT_CONTRAST, MAX_CONTRAST, MIN_CONTRAST};

const CAPTCHA_SLOT: &str = "__CAPTCHA_IMAGE__";
const MIN_SLOT: &str = "__MIN_CONTRAST__";
const MAX_SLOT: &str = "__MAX_CONTRAST__";
const DEFAULT_SLOT: &str = "__DEFAULT_CONTRAST__";

/// Render the index page with `captcha_b64` (PNG, base64) embedded.
pub fn render_index_page(captcha_b64: &str) -> String {
    INDEX_TEMPLATE
        .replace(CAPTCHA_SLOT, captcha_b64)
        .replace(MIN_SLOT, &format!("{MIN_CONTRAST:.1}"))
        .replace(MAX_SLOT, &format!("{MAX_CONTRAST:.1}"))
        .replace(DEFAULT_SLOT, &format!("{DEFAULT_CONTRAST:.1}"))
}

const INDEX_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Image Contrast Adjustment</title>
<style>
  * { box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif;
         margin: 0; padding: 24px; background: #f5f5f4; color: #1c1917; }
  main { max-width: 960px; margin: 0 auto; }
  h1 { font-size: 1.6rem; margin-bottom: 16px; }
  form, .panel { background: #fff; border-radius: 12px; padding: 20px;
                 box-shadow: 0 1px 3px rgba(0,0,0,0.08); margin-bottom: 20px; }
  label { display: block; font-weight: 600; margin: 12px 0 6px; }
  input[type=text] { padding: 8px; font-size: 1rem; width: 180px;
                     text-transform: uppercase; letter-spacing: 2px; }
  input[type=range] { width: 100%; }
  button { margin-top: 16px; padding: 10px 20px; border: 0; border-radius: 8px;
           background: #0d9488; color: #fff; font-size: 1rem; cursor: pointer; }
  button:disabled { opacity: 0.5; cursor: wait; }
  .captcha { display: flex; align-items: center; gap: 12px; }
  .captcha img { border: 1px solid #d6d3d1; border-radius: 6px; }
  .error { color: #b91c1c; font-weight: 600; min-height: 1.2em; }
  .grid { display: grid; grid-template-columns: 1fr 1fr; gap: 16px; }
  .grid img { width: 100%; border-radius: 8px; background: #e7e5e4; }
  .hidden { display: none; }
</style>
</head>
<body>
<main>
<h1>Image Contrast Adjustment</h1>

<form id="upload-form" enctype="multipart/form-data">
  <label for="image">Image</label>
  <input type="file" id="image" name="image" accept=".png,.jpg,.jpeg,.gif,.bmp">

  <label for="contrast">Contrast: <span id="contrast-value">__DEFAULT_CONTRAST__</span></label>
  <input type="range" id="contrast" name="contrast"
         min="__MIN_CONTRAST__" max="__MAX_CONTRAST__" step="0.1" value="__DEFAULT_CONTRAST__">

  <label for="captcha">Type the characters shown</label>
  <div class="captcha">
    <img id="captcha-image" alt="CAPTCHA" src="data:image/png;base64,__CAPTCHA_IMAGE__">
    <input type="text" id="captcha" name="captcha" autocomplete="off" maxlength="12">
  </div>

  <button type="submit" id="submit">Process</button>
  <p class="error" id="error"></p>
</form>

<section id="result" class="panel hidden">
  <p>Contrast level: <strong id="result-level"></strong>
     &middot; Category: <strong id="result-category"></strong></p>
  <div class="grid">
    <div><h3>Original</h3><img id="original-image" alt="Original"></div>
    <div><h3>Adjusted</h3><img id="result-image" alt="Adjusted"></div>
    <div><img id="original-histogram" alt="Original histogram"></div>
    <div><img id="enhanced-histogram" alt="Adjusted histogram"></div>
  </div>
  <p><a id="download-link" href="#">Download adjusted image</a></p>
</section>
</main>

<script>
(function () {
  var form = document.getElementById('upload-form');
  var slider = document.getElementById('contrast');
  var errorBox = document.getElementById('error');
  var submit = document.getElementById('submit');

  slider.addEventListener('input', function () {
    document.getElementById('contrast-value').textContent = slider.value;
  });

  function refreshCaptcha() {
    return fetch('/captcha', { credentials: 'same-origin' })
      .then(function (r) { return r.json(); })
      .then(function (data) {
        if (data.captcha_image) {
          document.getElementById('captcha-image').src =
            'data:image/png;base64,' + data.captcha_image;
        }
        document.getElementById('captcha').value = '';
      })
      .catch(function () {});
  }

  function png(id, b64) {
    document.getElementById(id).src = 'data:image/png;base64,' + b64;
  }

  form.addEventListener('submit', function (ev) {
    ev.preventDefault();
    errorBox.textContent = '';
    submit.disabled = true;

    fetch('/process', { method: 'POST', body: new FormData(form), credentials: 'same-origin' })
      .then(function (r) { return r.json(); })
      .then(function (data) {
        if (data.error) {
          errorBox.textContent = data.error;
          return;
        }
        png('original-image', data.original_image);
        png('result-image', data.result_image);
        png('original-histogram', data.original_histogram);
        png('enhanced-histogram', data.enhanced_histogram);
        document.getElementById('result-level').textContent = data.contrast_level;
        document.getElementById('result-category').textContent = data.category;
        document.getElementById('download-link').href =
          '/download/' + encodeURIComponent(data.result_filename);
        document.getElementById('result').classList.remove('hidden');
      })
      .catch(function () { errorBox.textContent = 'Request failed.'; })
      .then(function () {
        submit.disabled = false;
        return refreshCaptcha();
      });
  });
})();
</script>
</body>
</html>
"##;
