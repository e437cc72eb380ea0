//! Static assets shared by every generated page.

/// Shared stylesheet.
pub const SITE_CSS: &str = r#"
:root{
  --bg:#0b1020;
  --bg2:#0a0f1e;
  --panel:#0f172a;
  --card:#111b33;
  --card2:#0f1930;
  --text:#e6e9f2;
  --muted:#a8b0c3;
  --faint:#7b83a0;
  --border:rgba(255,255,255,.10);
  --border2:rgba(255,255,255,.16);
  --accent:#7c3aed;
  --accent2:#22c55e;
  --warn:#f59e0b;
  --bad:#ef4444;
  --shadow:0 10px 30px rgba(0,0,0,.35);
  --radius:14px;
  --mono:ui-monospace,SFMono-Regular,Menlo,Monaco,Consolas,"Liberation Mono",monospace;
  --sans:ui-sans-serif,system-ui,-apple-system,"Segoe UI",Roboto,Helvetica,Arial,sans-serif;
}

:root:not([data-theme="dark"]){
  --bg:#f6f7fb;
  --bg2:#f6f7fb;
  --panel:#ffffff;
  --card:#ffffff;
  --card2:#fbfcff;
  --text:#111827;
  --muted:#4b5563;
  --faint:#6b7280;
  --border:rgba(17,24,39,.10);
  --border2:rgba(17,24,39,.14);
  --accent:#6d28d9;
  --accent2:#16a34a;
  --warn:#b45309;
  --bad:#dc2626;
  --shadow:0 10px 26px rgba(17,24,39,.10);
}

*{box-sizing:border-box}
html,body{height:100%}
body{
  margin:0;
  background:linear-gradient(180deg,var(--bg2),var(--bg));
  color:var(--text);
  font-family:var(--sans);
  line-height:1.45;
}

a{color:inherit}
a.link{color:var(--accent);text-decoration:none}
a.link:hover{text-decoration:underline}

.topbar{
  position:sticky;top:0;z-index:50;
  display:flex;align-items:center;justify-content:space-between;
  padding:14px 18px;
  background:rgba(15,23,42,.72);
  backdrop-filter:blur(10px);
  border-bottom:1px solid var(--border);
}
:root:not([data-theme="dark"]) .topbar{background:rgba(255,255,255,.72)}

.crumbs{
  display:flex;align-items:center;min-width:0;overflow:hidden;
  white-space:nowrap;font-weight:700;letter-spacing:.2px;
}
.crumbs .sep{padding:0 6px;color:var(--muted);font-weight:600}
.crumb{
  display:inline-flex;align-items:center;padding:2px 6px;border-radius:10px;
  text-decoration:none;min-width:0;
}
.crumb:hover{background:rgba(124,58,237,.10)}
.crumbtxt{
  display:inline-block;max-width:320px;overflow:hidden;
  text-overflow:ellipsis;vertical-align:bottom;
}

.topbar .actions{display:flex;align-items:center;gap:10px}
.iconbtn{
  display:inline-flex;align-items:center;gap:8px;
  border:1px solid var(--border);
  background:linear-gradient(180deg,rgba(255,255,255,.06),rgba(255,255,255,.02));
  color:var(--text);padding:8px 10px;border-radius:10px;
  cursor:pointer;user-select:none;font-size:13px;text-decoration:none;
}
:root:not([data-theme="dark"]) .iconbtn{background:linear-gradient(180deg,rgba(17,24,39,.04),rgba(17,24,39,.02))}
.iconbtn:hover{border-color:var(--border2)}
.iconbtn.copied{outline:2px solid rgba(34,197,94,.35);border-color:rgba(34,197,94,.45)}

.app{
  display:grid;grid-template-columns:280px 1fr;gap:14px;
  padding:14px;max-width:1280px;margin:0 auto;
}

.sidebar{
  position:sticky;top:76px;height:calc(100vh - 90px);overflow:auto;
  padding:12px;border:1px solid var(--border);border-radius:var(--radius);
  background:var(--panel);box-shadow:var(--shadow);
}
.navtitle{font-size:12px;letter-spacing:.20em;text-transform:uppercase;color:var(--muted);margin:8px 4px}
.navlist{list-style:none;padding:0;margin:0}
.navlist li{margin:2px 0}
.navitem{
  display:flex;align-items:center;gap:8px;padding:8px 10px;border-radius:10px;
  text-decoration:none;color:var(--text);
}
.navitem:hover{background:rgba(124,58,237,.10)}
.navitem.active{background:rgba(124,58,237,.18);border:1px solid rgba(124,58,237,.25)}
.navitem code{font-family:var(--mono);font-size:12px;color:var(--muted)}

.main{min-width:0;display:flex;flex-direction:column;gap:14px}

.card{
  border:1px solid var(--border);border-radius:var(--radius);
  background:linear-gradient(180deg,var(--card),var(--card2));
  box-shadow:var(--shadow);overflow:hidden;
}
.card .cardhead{
  padding:14px 16px;display:flex;align-items:center;justify-content:space-between;
  gap:12px;border-bottom:1px solid var(--border);
}
.card .cardhead h1,.card .cardhead h2{margin:0;font-size:16px}
.card .cardbody{padding:14px 16px}

h1,h2,h3{margin:0 0 10px}
h1{font-size:20px}
h2{font-size:16px}
p{margin:8px 0;color:var(--muted)}
.meta{font-size:13px;color:var(--faint)}

.kpis{display:flex;flex-wrap:wrap;gap:10px}
.kpi{
  border:1px solid var(--border);border-radius:12px;padding:10px 12px;
  background:rgba(255,255,255,.04);
}
:root:not([data-theme="dark"]) .kpi{background:rgba(17,24,39,.02)}
.kpi .k{font-size:12px;color:var(--muted);margin-bottom:2px}
.kpi .v{font-size:14px;font-weight:700}

.badge{
  display:inline-flex;align-items:center;padding:3px 8px;border-radius:999px;
  border:1px solid var(--border);font-size:12px;color:var(--muted);
  background:rgba(255,255,255,.04);
}
.badge.req{color:var(--accent2);border-color:rgba(34,197,94,.35);background:rgba(34,197,94,.10)}
.badge.opt{color:var(--muted)}
.badge.warn{color:var(--warn);border-color:rgba(245,158,11,.35);background:rgba(245,158,11,.10)}
.badge.bad{color:var(--bad);border-color:rgba(239,68,68,.35);background:rgba(239,68,68,.10)}
.badge.kind{color:var(--accent);border-color:rgba(124,58,237,.35);background:rgba(124,58,237,.10)}

.chips{display:flex;flex-wrap:wrap;gap:6px}
.chip{
  border:1px solid var(--border);background:rgba(255,255,255,.04);
  border-radius:999px;padding:3px 8px;
}
.chip code{font-family:var(--mono);font-size:12px;color:var(--muted)}

.callout{
  border:1px solid rgba(124,58,237,.25);background:rgba(124,58,237,.10);
  border-radius:12px;padding:10px 12px;color:var(--muted);
}
.callout strong{color:var(--text)}

pre{
  margin:0;padding:12px;background:rgba(2,6,23,.65);
  border-top:1px solid rgba(255,255,255,.06);overflow:auto;
}
:root:not([data-theme="dark"]) pre{background:rgba(15,23,42,.06);border-top:1px solid rgba(17,24,39,.06)}
code{font-family:var(--mono);font-size:13px}

.tablewrap{overflow:auto}
table.keys{width:100%;border-collapse:separate;border-spacing:0;min-width:820px}
table.keys th,table.keys td{
  border-bottom:1px solid var(--border);padding:10px;vertical-align:top;
}
table.keys th{
  position:sticky;top:0;background:rgba(15,23,42,.88);backdrop-filter:blur(8px);
  text-align:left;font-size:12px;letter-spacing:.08em;text-transform:uppercase;
  color:var(--muted);
}
:root:not([data-theme="dark"]) table.keys th{background:rgba(255,255,255,.92)}
table.keys tr:hover td{background:rgba(124,58,237,.06)}

.keycell{display:flex;align-items:flex-start;justify-content:space-between;gap:10px}
.keycell .left{min-width:0}
.keycell .left code{word-break:break-word}

.filter{
  width:min(380px,100%);border:1px solid var(--border);
  background:rgba(255,255,255,.04);color:var(--text);border-radius:12px;
  padding:9px 10px;outline:none;
}
:root:not([data-theme="dark"]) .filter{background:rgba(17,24,39,.03)}
.filter:focus{border-color:rgba(124,58,237,.40);box-shadow:0 0 0 4px rgba(124,58,237,.12)}

.constraint{
  border:1px solid var(--border);border-radius:14px;padding:12px;
  background:rgba(255,255,255,.03);
}
:root:not([data-theme="dark"]) .constraint{background:rgba(17,24,39,.02)}
.constraint .row{
  display:flex;align-items:flex-start;justify-content:space-between;
  gap:10px;flex-wrap:wrap;
}
.constraint .row .title{font-weight:700}
.constraint p{margin:8px 0 10px;color:var(--muted)}

.graph{width:100%;min-height:140px;overflow:auto}
.graph-svg{display:block}
.graph-node rect{fill:rgba(15,23,42,.96);stroke:var(--border2)}
:root:not([data-theme="dark"]) .graph-node rect{fill:#ffffff}
.graph-node text{font-size:12px;fill:var(--text)}
.graph-node:hover rect{stroke:var(--accent);cursor:pointer}
.graph-edge{stroke:var(--border2);stroke-width:1.1;fill:none}
.graph-empty{font-size:12px;color:var(--muted)}

@media (max-width:980px){
  .app{grid-template-columns:1fr}
  .sidebar{position:relative;top:auto;height:auto}
}
"#;

/// Shared client-side script: theme toggle, copy buttons, key filtering,
/// and structure-graph layout.
pub const SITE_JS: &str = r#"
(function(){
  const root = document.documentElement;

  function preferredTheme(){
    const stored = localStorage.getItem('csl-theme');
    if(stored === 'dark' || stored === 'light') return stored;
    if(window.matchMedia && window.matchMedia('(prefers-color-scheme: dark)').matches) return 'dark';
    return 'light';
  }
  root.dataset.theme = preferredTheme();

  const toggle = document.querySelector('[data-theme-toggle]');
  if(toggle){
    toggle.setAttribute('aria-pressed', root.dataset.theme === 'dark' ? 'true' : 'false');
    toggle.addEventListener('click', ()=>{
      const next = root.dataset.theme === 'dark' ? 'light' : 'dark';
      root.dataset.theme = next;
      localStorage.setItem('csl-theme', next);
      toggle.setAttribute('aria-pressed', next === 'dark' ? 'true' : 'false');
    });
  }

  function copyText(text){
    if(navigator.clipboard && navigator.clipboard.writeText){
      navigator.clipboard.writeText(text).catch(()=>fallback(text));
    } else {
      fallback(text);
    }
  }

  function fallback(text){
    const ta = document.createElement('textarea');
    ta.value = text;
    ta.style.position = 'fixed';
    ta.style.opacity = '0';
    document.body.appendChild(ta);
    ta.select();
    try { document.execCommand('copy'); } catch(_) {}
    document.body.removeChild(ta);
  }

  document.addEventListener('click', (e)=>{
    const btn = e.target.closest('[data-copy],[data-copy-el]');
    if(!btn) return;
    e.preventDefault();

    let value = btn.getAttribute('data-copy');
    const elId = btn.getAttribute('data-copy-el');
    if(elId){
      const el = document.getElementById(elId);
      if(el) value = el.textContent || '';
    }
    if(typeof value !== 'string') value = '';
    copyText(value);

    btn.classList.add('copied');
    setTimeout(()=>btn.classList.remove('copied'), 900);
  });

  document.querySelectorAll('input[data-filter-table]').forEach((input)=>{
    const table = document.getElementById(input.getAttribute('data-filter-table'));
    if(!table) return;
    const rows = Array.from(table.querySelectorAll('tbody tr'));

    function apply(){
      const q = (input.value || '').trim().toLowerCase();
      for(const r of rows){
        const hay = (r.getAttribute('data-search') || '').toLowerCase();
        r.style.display = (!q || hay.includes(q)) ? '' : 'none';
      }
    }
    input.addEventListener('input', apply);
    apply();
  });

  function renderStructureGraph(container){
    const raw = container.getAttribute('data-structure-graph');
    if(!raw) return;

    let data;
    try { data = JSON.parse(raw); } catch(_) { return; }
    if(!data || !Array.isArray(data.nodes) || !data.nodes.length){
      container.innerHTML = '<p class="graph-empty">No nested tables to visualize.</p>';
      return;
    }

    const nodes = data.nodes;
    const edges = Array.isArray(data.edges) ? data.edges : [];
    const svgNS = 'http://www.w3.org/2000/svg';

    // Size nodes to their labels via canvas text measurement.
    const canvas = document.createElement('canvas');
    const ctx = canvas.getContext('2d');
    ctx.font = '12px ' + (getComputedStyle(document.body).fontFamily || 'system-ui, sans-serif');
    const textWidth = (s)=> ctx.measureText(s == null ? '' : String(s)).width;

    const MIN_W = 80, MAX_W = 240, PAD_X = 14, NODE_H = 32, GAP = 24;
    const MARGIN_X = 30, TOP_MARGIN = 30, LEVEL_GAP = 120;

    function ellipsize(s, maxPx){
      s = (s == null) ? '' : String(s);
      if(textWidth(s) <= maxPx) return s;
      let lo = 0, hi = s.length;
      while(lo < hi){
        const mid = ((lo + hi) / 2) | 0;
        if(textWidth(s.slice(0, mid) + '…') <= maxPx) lo = mid + 1;
        else hi = mid;
      }
      return s.slice(0, Math.max(0, lo - 1)) + '…';
    }

    const levels = {};
    let maxDepth = 0;
    nodes.forEach((n)=>{
      const d = (typeof n.depth === 'number' && n.depth >= 0) ? n.depth : 0;
      (levels[d] = levels[d] || []).push(n);
      if(d > maxDepth) maxDepth = d;
    });

    const geom = {};
    const maxTextW = MAX_W - PAD_X*2;
    nodes.forEach((n)=>{
      const shown = ellipsize(n.label, maxTextW);
      const w = Math.max(MIN_W, Math.min(MAX_W, Math.ceil(textWidth(shown) + PAD_X*2)));
      geom[n.id] = { w, shown };
    });

    let width = 900;
    for(let depth = 0; depth <= maxDepth; depth++){
      const row = levels[depth] || [];
      if(!row.length) continue;
      const rowW = row.reduce((acc, n)=> acc + geom[n.id].w, 0) + GAP * (row.length - 1);
      width = Math.max(width, rowW + MARGIN_X*2);
    }
    const height = TOP_MARGIN + (maxDepth + 1) * LEVEL_GAP;

    const svg = document.createElementNS(svgNS,'svg');
    svg.setAttribute('viewBox', '0 0 ' + width + ' ' + height);
    svg.setAttribute('width', width);
    svg.setAttribute('height', height);
    svg.classList.add('graph-svg');

    // Deterministic layout: rows by depth, horizontally centered.
    const pos = {};
    for(let depth = 0; depth <= maxDepth; depth++){
      const row = levels[depth] || [];
      if(!row.length) continue;
      const rowW = row.reduce((acc, n)=> acc + geom[n.id].w, 0) + GAP * (row.length - 1);
      let x = (width - rowW) / 2;
      row.forEach((n)=>{
        const g = geom[n.id];
        pos[n.id] = { x: x + g.w/2, y: TOP_MARGIN + depth * LEVEL_GAP, w: g.w, h: NODE_H, shown: g.shown };
        x += g.w + GAP;
      });
    }

    edges.forEach((e)=>{
      const from = pos[e.from], to = pos[e.to];
      if(!from || !to) return;
      const midY = (from.y + from.h/2 + to.y - to.h/2) / 2;
      const path = document.createElementNS(svgNS, 'path');
      path.setAttribute('d', ['M', from.x, from.y + from.h/2,
                              'C', from.x, midY, to.x, midY, to.x, to.y - to.h/2].join(' '));
      path.setAttribute('class', 'graph-edge');
      svg.appendChild(path);
    });

    nodes.forEach((n)=>{
      const p = pos[n.id];
      if(!p) return;

      const g = document.createElementNS(svgNS, 'g');
      g.setAttribute('transform', 'translate(' + (p.x - p.w/2) + ',' + (p.y - p.h/2) + ')');
      g.classList.add('graph-node');
      if(n.file) g.dataset.file = n.file;

      const title = document.createElementNS(svgNS, 'title');
      const parts = (n.id || '').split('\u001f').filter(Boolean);
      title.textContent =
        (data.schema ? (data.schema + (parts.length ? ' > ' : '')) : '') +
        (parts.join(' > ') || (data.schema || ''));
      g.appendChild(title);

      const rect = document.createElementNS(svgNS, 'rect');
      rect.setAttribute('width', p.w);
      rect.setAttribute('height', p.h);
      rect.setAttribute('rx', 10);
      rect.setAttribute('ry', 10);

      const text = document.createElementNS(svgNS, 'text');
      text.setAttribute('x', p.w/2);
      text.setAttribute('y', p.h/2 + 4);
      text.setAttribute('text-anchor', 'middle');
      text.textContent = p.shown;

      g.appendChild(rect);
      g.appendChild(text);
      svg.appendChild(g);
    });

    container.innerHTML = '';
    container.appendChild(svg);
  }

  function initStructureGraphs(){
    document.querySelectorAll('[data-structure-graph]').forEach((el)=>{
      renderStructureGraph(el);
      el.addEventListener('click', (e)=>{
        const g = e.target.closest('.graph-node');
        if(g && g.dataset.file){
          window.location.href = g.dataset.file;
        }
      });
    });
  }

  if(document.readyState === 'loading'){
    document.addEventListener('DOMContentLoaded', initStructureGraphs);
  } else {
    initStructureGraphs();
  }
})();
"#;
